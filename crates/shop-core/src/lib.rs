//! # shop-core
//!
//! Core types and operations for the simple-shop checkout.
//!
//! This crate provides:
//! - `Item`, `NewItem` and `Currency` for the catalog
//! - `Order`, `OrderLine`, `Discount` and `Tax` plus `PricingBreakdown` for totals
//! - `Store` trait with an in-memory implementation
//! - `CartManager` for session-scoped carts
//! - `PaymentGateway` trait and `CheckoutService` for payments
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{CartManager, CheckoutService, CheckoutUrls, InMemoryStore};
//!
//! let store = InMemoryStore::shared();
//! let cart = CartManager::new(store.clone());
//!
//! // Add two units of item 1 to a fresh cart
//! let order = cart.add_item(None, 1, 2).await?;
//!
//! // Hosted checkout for the whole cart
//! let checkout = CheckoutService::new(store, gateway, CheckoutUrls::new("https://shop.example.com"));
//! let session = checkout.order_session(order.id).await?;
//! ```

pub mod cart;
pub mod checkout;
pub mod error;
pub mod gateway;
pub mod item;
pub mod order;
pub mod pricing;
pub mod store;

// Re-exports for convenience
pub use cart::{parse_quantity, CartManager, CartView, ClearOutcome, FALLBACK_CURRENCY};
pub use checkout::CheckoutService;
pub use error::{ShopError, ShopResult};
pub use gateway::{
    CheckoutMode, CheckoutSession, CheckoutUrls, FutureUsage, IntentRequest, PaymentGateway,
    PaymentIntent, SessionLineItem, SessionRequest, SharedGateway,
};
pub use item::{CatalogSeed, Currency, FieldErrors, Item, ItemId, NewItem};
pub use order::{Discount, Order, OrderId, OrderLine, OrderStatus, Tax};
pub use pricing::PricingBreakdown;
pub use store::{InMemoryStore, SharedStore, Store};
