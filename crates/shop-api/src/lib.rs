//! # shop-api
//!
//! HTTP API layer for simple-shop.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Catalog, cart and payment endpoints
//! - Signed cookie sessions holding the visitor's cart
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/items/` | List items |
//! | POST | `/create-item/` | Create item |
//! | GET | `/item/{id}/` | Item page |
//! | POST | `/add-to-order/{item_id}/` | Add to cart |
//! | GET | `/cart/` | Cart page |
//! | GET | `/clear-cart/` | Clear cart |
//! | POST | `/order/{order_id}/discount/` | Attach discount |
//! | POST | `/order/{order_id}/tax/` | Attach tax |
//! | POST | `/checkout-order/{order_id}/` | Itemized checkout session |
//! | POST | `/create-checkout-session/{item_id}/` | Item payment intent |
//! | POST | `/create-checkout-session-for-order/{order_id}/` | Order payment intent |
//! | POST | `/create-intent/{item_id}/` | Item payment intent, card kept |
//! | POST | `/create-payment-intent/{item_id}/` | Item payment intent, card kept |

pub mod handlers;
pub mod routes;
pub mod session;
pub mod state;

pub use routes::create_router;
pub use session::{Session, SessionStore};
pub use state::{AppConfig, AppState};
