//! # shop-stripe
//!
//! Stripe payment gateway for simple-shop.
//!
//! `StripeGateway` implements `shop_core::PaymentGateway` with:
//! - Payment intents for single items and whole orders
//! - Hosted checkout sessions with itemized lines
//! - One key pair per currency, with a default-currency fallback
//! - Idempotency keys and bounded retries on network errors, 429 and 5xx
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_stripe::StripeGateway;
//! use shop_core::{CheckoutService, CheckoutUrls, InMemoryStore};
//! use std::sync::Arc;
//!
//! // Create gateway from environment
//! let gateway = Arc::new(StripeGateway::from_env()?);
//!
//! let checkout = CheckoutService::new(
//!     InMemoryStore::shared(),
//!     gateway,
//!     CheckoutUrls::new("https://shop.example.com"),
//! );
//! let intent = checkout.item_intent(1, false).await?;
//! ```

pub mod config;
pub mod gateway;

// Re-exports
pub use config::{RetryPolicy, StripeConfig, StripeKeys};
pub use gateway::StripeGateway;
