//! # Request Handlers
//!
//! Axum request handlers for the shop: catalog, cart, and the three payment
//! flows (item intent, order intent, itemized checkout session).

use crate::session::Session;
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        Path, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::{
    parse_quantity, ClearOutcome, Currency, Item, ItemId, NewItem, Order, OrderId, ShopError,
    Store,
};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Add-to-order form body
#[derive(Debug, Default, Deserialize)]
pub struct AddToOrderForm {
    #[serde(default)]
    pub quantity: Option<String>,
}

/// Discount or tax request body
#[derive(Debug, Deserialize)]
pub struct RateRequest {
    /// Percentage
    pub rate: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionIdResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Client secret, keyed `clientSecret` for the single-item checkout route
#[derive(Debug, Serialize)]
pub struct CamelClientSecretResponse {
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
pub struct ClientSecretResponse {
    pub client_secret: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn shop_error_to_response(err: ShopError) -> ApiError {
    let code = err.status_code();
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorResponse::new(err.to_string())),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "simple-shop",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// List the catalog
pub async fn list_items(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let items = state.store.items().await.map_err(shop_error_to_response)?;
    Ok(Json(serde_json::json!({
        "count": items.len(),
        "items": items,
    })))
}

/// Create a catalog item from a JSON body.
///
/// Validation failures answer 400 with a `{field: [messages]}` map.
#[instrument(skip(state, body))]
pub async fn create_item(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), Response> {
    let Json(body) = body.map_err(|e| {
        warn!("Rejected item body: {}", e);
        bad_request(format!("JSON parse error - {}", e.body_text())).into_response()
    })?;

    let new_item = NewItem::from_json(&body).map_err(|errors| {
        info!("Item validation failed: {}", errors);
        (StatusCode::BAD_REQUEST, Json(errors)).into_response()
    })?;

    let item = state
        .store
        .create_item(new_item)
        .await
        .map_err(|e| shop_error_to_response(e).into_response())?;

    info!(item_id = item.id, name = %item.name, "Created item");
    Ok((StatusCode::CREATED, Json(item)))
}

/// Item page with the publishable key for the item's currency
#[instrument(skip(state))]
pub async fn item_page(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
) -> Result<Html<String>, ApiError> {
    let item = state.store.item(item_id).await.map_err(shop_error_to_response)?;
    let publishable_key = state
        .gateway
        .publishable_key(item.currency)
        .map_err(shop_error_to_response)?;

    Ok(Html(render_item_page(&item, &publishable_key)))
}

/// Add an item to the session's cart
#[instrument(skip(state, session, form))]
pub async fn add_to_order(
    State(state): State<AppState>,
    mut session: Session,
    Path(item_id): Path<ItemId>,
    form: Result<Form<AddToOrderForm>, FormRejection>,
) -> Result<(Session, Json<MessageResponse>), ApiError> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let quantity = parse_quantity(form.quantity.as_deref());

    let order = state
        .cart
        .add_item(session.cart_id(), item_id, quantity)
        .await
        .map_err(|e| {
            warn!(item_id, "Failed to add item to cart: {}", e);
            shop_error_to_response(e)
        })?;

    session.set_cart_id(order.id).await;

    Ok((
        session,
        Json(MessageResponse {
            message: "Item added to cart!".to_string(),
        }),
    ))
}

/// Cart page with the publishable key for the cart's currency
#[instrument(skip(state, session))]
pub async fn cart_page(
    State(state): State<AppState>,
    mut session: Session,
) -> Result<(Session, Html<String>), ApiError> {
    let view = state
        .cart
        .view(session.cart_id())
        .await
        .map_err(shop_error_to_response)?;

    session.set_cart_id(view.order.id).await;

    let publishable_key = state
        .gateway
        .publishable_key(view.currency)
        .map_err(shop_error_to_response)?;

    let page = render_cart_page(&view.order, view.currency, &publishable_key);
    Ok((session, Html(page)))
}

/// Empty the session's cart and go back to the cart page
#[instrument(skip(state, session))]
pub async fn clear_cart(State(state): State<AppState>, mut session: Session) -> impl IntoResponse {
    match state.cart.clear(session.cart_id()).await {
        Ok(ClearOutcome::Cleared(order)) => {
            info!(order_id = order.id, "Cart cleared");
            session.remove_cart_id().await;
        }
        Ok(_) => {}
        Err(e) => error!("Failed to clear cart: {}", e),
    }

    (session, Redirect::to("/cart/"))
}

/// Attach a discount to an order
#[instrument(skip(state, body))]
pub async fn apply_discount(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    body: Result<Json<RateRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;

    let order = state
        .cart
        .apply_discount(order_id, request.rate)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(order))
}

/// Attach a tax to an order
#[instrument(skip(state, body))]
pub async fn apply_tax(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    body: Result<Json<RateRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;

    let order = state
        .cart
        .apply_tax(order_id, request.rate)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(order))
}

/// Itemized hosted checkout session for an order
#[instrument(skip(state))]
pub async fn checkout_order(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<SessionIdResponse>, ApiError> {
    let session = state
        .checkout
        .order_session(order_id)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(SessionIdResponse {
        session_id: session.session_id,
    }))
}

/// Payment intent for one unit of an item
#[instrument(skip(state))]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
) -> Result<Json<CamelClientSecretResponse>, ApiError> {
    let intent = state
        .checkout
        .item_intent(item_id, false)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(CamelClientSecretResponse {
        client_secret: intent.client_secret,
    }))
}

/// Payment intent for a whole order, keeping the card for later charges
#[instrument(skip(state))]
pub async fn create_checkout_session_for_order(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<ClientSecretResponse>, ApiError> {
    let intent = state
        .checkout
        .order_intent(order_id)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(ClientSecretResponse {
        client_secret: intent.client_secret,
    }))
}

/// Payment intent for one unit of an item, keeping the card for later charges
#[instrument(skip(state))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
) -> Result<Json<ClientSecretResponse>, ApiError> {
    let intent = state
        .checkout
        .item_intent(item_id, true)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(ClientSecretResponse {
        client_secret: intent.client_secret,
    }))
}

/// Payment success page
pub async fn payment_success() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>Payment Successful</title></head>
<body style="font-family: system-ui; text-align: center; padding: 60px;">
    <h1>Payment Successful!</h1>
    <p style="color: #666;">Your payment was processed successfully.</p>
    <p><a href="/cart/">Back to cart</a></p>
</body>
</html>
"#,
    )
}

/// Payment cancel page
pub async fn payment_cancel() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>Payment Cancelled</title></head>
<body style="font-family: system-ui; text-align: center; padding: 60px;">
    <h1>Payment Cancelled</h1>
    <p style="color: #666;">No charges were made.</p>
    <p><a href="/cart/">Back to cart</a></p>
</body>
</html>
"#,
    )
}

// =============================================================================
// Pages
// =============================================================================

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_item_page(item: &Item, publishable_key: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html>
<head>
    <title>{name}</title>
    <script src="https://js.stripe.com/v3/"></script>
</head>
<body style="font-family: system-ui; padding: 40px;">
    <h1>{name}</h1>
    <p>{description}</p>
    <p><strong>{price} {currency}</strong></p>

    <form id="add-form">
        <input type="number" name="quantity" value="1" min="1">
        <button type="submit">Add to cart</button>
    </form>
    <button id="buy-button">Buy</button>
    <div id="card-element"></div>
    <p id="message"></p>
    <p><a href="/cart/">Cart</a></p>

    <script>
        const stripe = Stripe("{key}");
        const card = stripe.elements().create("card");
        card.mount("#card-element");
        const message = document.getElementById("message");

        document.getElementById("add-form").addEventListener("submit", async (event) => {{
            event.preventDefault();
            const response = await fetch("/add-to-order/{id}/", {{
                method: "POST",
                body: new URLSearchParams(new FormData(event.target)),
            }});
            const data = await response.json();
            message.textContent = data.message || data.error;
        }});

        document.getElementById("buy-button").addEventListener("click", async () => {{
            const response = await fetch("/create-checkout-session/{id}/", {{ method: "POST" }});
            const data = await response.json();
            if (data.error) {{
                message.textContent = data.error;
                return;
            }}
            const result = await stripe.confirmCardPayment(data.clientSecret, {{
                payment_method: {{ card: card }},
            }});
            if (result.error) {{
                message.textContent = result.error.message;
            }} else {{
                window.location.href = "/payment-success/";
            }}
        }});
    </script>
</body>
</html>
"##,
        id = item.id,
        name = escape_html(&item.name),
        description = escape_html(&item.description),
        price = item.price,
        currency = item.currency,
        key = escape_html(publishable_key),
    )
}

fn render_cart_page(order: &Order, currency: Currency, publishable_key: &str) -> String {
    let rows: String = order
        .lines
        .iter()
        .map(|line| {
            format!(
                "        <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape_html(&line.item.name),
                line.quantity,
                line.item.price,
                line.cost()
            )
        })
        .collect();

    let adjustments: String = order
        .discounts
        .iter()
        .map(|discount| format!("    <p>Discount: {}%</p>\n", discount.rate))
        .chain(
            order
                .taxes
                .iter()
                .map(|tax| format!("    <p>Tax: {}%</p>\n", tax.rate)),
        )
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Cart</title>
    <script src="https://js.stripe.com/v3/"></script>
</head>
<body style="font-family: system-ui; padding: 40px;">
    <h1>Cart</h1>
    <table>
        <tr><th>Item</th><th>Quantity</th><th>Price</th><th>Cost</th></tr>
{rows}    </table>
    <p>Subtotal: {subtotal} {currency}</p>
{adjustments}    <p><strong>Total: {total} {currency}</strong></p>

    <button id="checkout-button">Checkout</button>
    <a href="/clear-cart/">Clear cart</a>
    <p id="message"></p>

    <script>
        const stripe = Stripe("{key}");
        document.getElementById("checkout-button").addEventListener("click", async () => {{
            const response = await fetch("/checkout-order/{order_id}/", {{ method: "POST" }});
            const data = await response.json();
            if (data.error) {{
                document.getElementById("message").textContent = data.error;
                return;
            }}
            await stripe.redirectToCheckout({{ sessionId: data.sessionId }});
        }});
    </script>
</body>
</html>
"#,
        rows = rows,
        subtotal = order.total_price_before_discounts(),
        adjustments = adjustments,
        total = order.total_price,
        currency = currency,
        key = escape_html(publishable_key),
        order_id = order.id,
    )
}
