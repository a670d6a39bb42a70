//! # Shop Error Types
//!
//! Typed error handling for catalog, cart and checkout operations.
//! Everything in the core returns `Result<T, ShopError>`.

use crate::item::ItemId;
use crate::order::{OrderId, OrderStatus};
use thiserror::Error;

/// Core error type for all shop operations
#[derive(Debug, Error)]
pub enum ShopError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Item not found in catalog
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: ItemId },

    /// Order not found
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: OrderId },

    /// Checkout requested for an order without lines
    #[error("Order is empty")]
    EmptyOrder { order_id: OrderId },

    /// Cart mutation on an order that is no longer open
    #[error("Order {order_id} is {status}, not pending")]
    OrderNotPending { order_id: OrderId, status: OrderStatus },

    /// Item currency differs from the currency already in the cart
    #[error("Cart is priced in {cart}, cannot add an item priced in {item}")]
    CurrencyMismatch { cart: String, item: String },

    /// Currency not supported
    #[error("Unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },

    /// Amount cannot be represented in the payment API's minor units
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    /// Order status change not allowed
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Payment provider rejected the request
    #[error("{message}")]
    Provider { provider: String, message: String },

    /// Payment provider answered with a server-side failure
    #[error("Provider unavailable [{provider}]: HTTP {status}")]
    ProviderUnavailable { provider: String, status: u16 },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limited by provider
    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopError {
    /// Returns true if a payment call failing with this error may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShopError::Network(_)
                | ShopError::RateLimited { .. }
                | ShopError::ProviderUnavailable { .. }
        )
    }

    /// Returns true if this error came from talking to the payment provider
    pub fn is_payment_failure(&self) -> bool {
        matches!(
            self,
            ShopError::Provider { .. }
                | ShopError::ProviderUnavailable { .. }
                | ShopError::Network(_)
                | ShopError::RateLimited { .. }
                | ShopError::Serialization(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error.
    ///
    /// Payment provider failures are reported as 400 to the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::Configuration(_) => 500,
            ShopError::InvalidRequest(_) => 400,
            ShopError::ItemNotFound { .. } => 404,
            ShopError::OrderNotFound { .. } => 404,
            ShopError::EmptyOrder { .. } => 400,
            ShopError::OrderNotPending { .. } => 409,
            ShopError::CurrencyMismatch { .. } => 400,
            ShopError::UnsupportedCurrency { .. } => 400,
            ShopError::InvalidAmount { .. } => 400,
            ShopError::InvalidTransition { .. } => 409,
            ShopError::Provider { .. }
            | ShopError::ProviderUnavailable { .. }
            | ShopError::Network(_)
            | ShopError::RateLimited { .. }
            | ShopError::Serialization(_) => 400,
            ShopError::Internal(_) => 500,
        }
    }
}

/// Result type alias for shop operations
pub type ShopResult<T> = Result<T, ShopError>;
