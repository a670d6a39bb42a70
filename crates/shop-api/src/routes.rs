//! # Routes
//!
//! Axum router configuration for the shop.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Catalog:
///   - GET  /items/ - List items
///   - POST /create-item/ - Create item from JSON
///   - GET  /item/{id}/ - Item page
///
/// - Cart:
///   - POST /add-to-order/{item_id}/ - Add item to the session's cart
///   - GET  /cart/ - Cart page
///   - GET  /clear-cart/ - Empty the cart, redirect to /cart/
///   - POST /order/{order_id}/discount/ - Attach a discount
///   - POST /order/{order_id}/tax/ - Attach a tax
///
/// - Payments:
///   - POST /checkout-order/{order_id}/ - Itemized checkout session
///   - POST /create-checkout-session/{item_id}/ - Item payment intent
///   - POST /create-checkout-session-for-order/{order_id}/ - Order payment intent
///   - POST /create-intent/{item_id}/ - Item payment intent, card kept
///   - POST /create-payment-intent/{item_id}/ - Same as /create-intent/
///
/// - Static pages:
///   - GET /payment-success/ - Success page
///   - GET /payment/cancel/ - Cancel page
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let catalog_routes = Router::new()
        .route("/items/", get(handlers::list_items))
        .route("/create-item/", post(handlers::create_item))
        .route("/item/{item_id}/", get(handlers::item_page));

    let cart_routes = Router::new()
        .route("/add-to-order/{item_id}/", post(handlers::add_to_order))
        .route("/cart/", get(handlers::cart_page))
        .route("/clear-cart/", get(handlers::clear_cart))
        .route("/order/{order_id}/discount/", post(handlers::apply_discount))
        .route("/order/{order_id}/tax/", post(handlers::apply_tax));

    let payment_routes = Router::new()
        .route("/checkout-order/{order_id}/", post(handlers::checkout_order))
        .route(
            "/create-checkout-session/{item_id}/",
            post(handlers::create_checkout_session),
        )
        .route(
            "/create-checkout-session-for-order/{order_id}/",
            post(handlers::create_checkout_session_for_order),
        )
        .route("/create-intent/{item_id}/", post(handlers::create_payment_intent))
        .route(
            "/create-payment-intent/{item_id}/",
            post(handlers::create_payment_intent),
        );

    let page_routes = Router::new()
        .route("/payment-success/", get(handlers::payment_success))
        .route("/payment/cancel/", get(handlers::payment_cancel));

    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .merge(catalog_routes)
        .merge(cart_routes)
        .merge(payment_routes)
        .merge(page_routes)
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        // State
        .with_state(state)
}
