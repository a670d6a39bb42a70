//! # Payment Gateway Trait
//!
//! Seam between checkout assembly and a hosted payment provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PaymentGateway (trait)                     │
//! │  ├── create_payment_intent()   → client secret              │
//! │  ├── create_checkout_session() → hosted session id          │
//! │  └── publishable_key()         → per-currency browser key   │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                    ┌───────┴───────┐
//!                    │ StripeGateway │
//!                    └───────────────┘
//! ```

use crate::error::ShopResult;
use crate::item::Currency;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What the provider should do with the payment method after the charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FutureUsage {
    /// Keep the card for charges made while the customer is away
    OffSession,
    /// Keep the card for charges the customer confirms again
    OnSession,
}

impl FutureUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FutureUsage::OffSession => "off_session",
            FutureUsage::OnSession => "on_session",
        }
    }
}

/// Request for a single charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Amount in minor units
    pub amount: i64,

    pub currency: Currency,

    /// Links the intent back to the item or order
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_future_usage: Option<FutureUsage>,

    /// Sent with every attempt of this request, so a retry cannot charge twice
    pub idempotency_key: String,
}

/// Checkout session mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// One-time payment
    #[default]
    Payment,
    /// Save card for later
    Setup,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Setup => "setup",
        }
    }
}

/// A line item shown on the hosted checkout page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub name: String,
    /// Unit amount in minor units; negative for the discount line
    pub unit_amount: i64,
    pub currency: Currency,
    pub quantity: u32,
}

/// Request for a hosted multi-item checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub line_items: Vec<SessionLineItem>,
    pub currency: Currency,
    pub payment_method_types: Vec<String>,
    #[serde(default)]
    pub mode: CheckoutMode,
    pub success_url: String,
    pub cancel_url: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub idempotency_key: String,
}

/// A payment intent created by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Provider's intent ID
    pub id: String,
    /// Secret the browser uses to confirm the payment
    pub client_secret: String,
    pub amount: i64,
    pub currency: Currency,
}

/// A hosted checkout session created by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID
    pub session_id: String,
    /// Hosted page to redirect the customer to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

/// Hosted payment provider.
///
/// Implementations pick credentials for the request's currency on every
/// call; nothing is cached across currencies.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent and return its client secret.
    async fn create_payment_intent(&self, request: &IntentRequest) -> ShopResult<PaymentIntent>;

    /// Create a hosted checkout session.
    async fn create_checkout_session(&self, request: &SessionRequest)
        -> ShopResult<CheckoutSession>;

    /// Browser-side key for pages priced in `currency`.
    fn publishable_key(&self, currency: Currency) -> ShopResult<String>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type SharedGateway = Arc<dyn PaymentGateway>;

/// Absolute callback URLs for the hosted checkout page
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Base URL of the application (e.g., "https://shop.example.com")
    pub base_url: String,
    /// Success page path
    pub success_path: String,
    /// Cancel page path
    pub cancel_path: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            success_path: "/payment-success/".to_string(),
            cancel_path: "/payment/cancel/".to_string(),
        }
    }

    pub fn success_url(&self) -> String {
        format!("{}{}", self.base_url, self.success_path)
    }

    pub fn cancel_url(&self) -> String {
        format!("{}{}", self.base_url, self.cancel_path)
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_urls() {
        let urls = CheckoutUrls::new("https://shop.example.com/");

        assert_eq!(urls.success_url(), "https://shop.example.com/payment-success/");
        assert_eq!(urls.cancel_url(), "https://shop.example.com/payment/cancel/");
    }

    #[test]
    fn test_future_usage_wire_names() {
        assert_eq!(FutureUsage::OffSession.as_str(), "off_session");
        assert_eq!(CheckoutMode::Payment.as_str(), "payment");
        assert_eq!(CheckoutMode::default(), CheckoutMode::Payment);
    }
}
