//! # Stripe Gateway
//!
//! `PaymentGateway` over the Stripe REST API:
//! - `POST /v1/payment_intents` for single charges
//! - `POST /v1/checkout/sessions` for itemized hosted checkout
//!
//! Every call authenticates with the secret key for the request's currency and
//! carries the request's idempotency key, so retried attempts cannot create a
//! second charge.

use crate::config::StripeConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use shop_core::{
    CheckoutSession, Currency, IntentRequest, PaymentGateway, PaymentIntent, SessionRequest,
    ShopError, ShopResult,
};
use tracing::{debug, error, info, instrument, warn};

const PROVIDER: &str = "stripe";

/// Stripe implementation of [`PaymentGateway`]
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(config: StripeConfig) -> ShopResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ShopError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Form parameters for `POST /v1/payment_intents`
    fn intent_params(request: &IntentRequest) -> Vec<(String, String)> {
        let mut params = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.as_str().to_string()),
        ];

        if let Some(usage) = request.setup_future_usage {
            params.push(("setup_future_usage".to_string(), usage.as_str().to_string()));
        }

        for (key, value) in &request.metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }

        params
    }

    /// Form parameters for `POST /v1/checkout/sessions`
    fn session_params(request: &SessionRequest) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), request.mode.as_str().to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];

        for (i, method) in request.payment_method_types.iter().enumerate() {
            params.push((format!("payment_method_types[{}]", i), method.clone()));
        }

        for (i, item) in request.line_items.iter().enumerate() {
            params.push((
                format!("line_items[{}][price_data][currency]", i),
                item.currency.as_str().to_string(),
            ));
            params.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount.to_string(),
            ));
            params.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            params.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
        }

        for (key, value) in &request.metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }

        params
    }

    /// POST a form, retrying retryable failures under the configured policy.
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        currency: Currency,
        idempotency_key: &str,
        params: &[(String, String)],
    ) -> ShopResult<T> {
        let retry = self.config.retry;
        let mut attempt = 1;

        loop {
            match self.send_once(path, currency, idempotency_key, params).await {
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    let delay = retry.delay_after(attempt);
                    warn!(
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Stripe request failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        path: &str,
        currency: Currency,
        idempotency_key: &str,
        params: &[(String, String)],
    ) -> ShopResult<T> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header(currency)?)
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", idempotency_key)
            .form(params)
            .send()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);
            return Err(error_from_response(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

fn error_from_response(status: StatusCode, body: &str) -> ShopError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ShopError::RateLimited {
            provider: PROVIDER.to_string(),
        };
    }

    if status.is_server_error() {
        return ShopError::ProviderUnavailable {
            provider: PROVIDER.to_string(),
            status: status.as_u16(),
        };
    }

    let message = match serde_json::from_str::<StripeErrorResponse>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => format!("HTTP {}: {}", status, body),
    };

    ShopError::Provider {
        provider: PROVIDER.to_string(),
        message,
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(amount = request.amount, currency = %request.currency))]
    async fn create_payment_intent(&self, request: &IntentRequest) -> ShopResult<PaymentIntent> {
        let params = Self::intent_params(request);
        debug!("Creating Stripe payment intent: {} params", params.len());

        let response: StripePaymentIntentResponse = self
            .post_form(
                "/v1/payment_intents",
                request.currency,
                &request.idempotency_key,
                &params,
            )
            .await?;

        let client_secret = response.client_secret.ok_or_else(|| {
            ShopError::Serialization("Stripe payment intent has no client_secret".to_string())
        })?;

        info!("Created Stripe payment intent: id={}", response.id);

        Ok(PaymentIntent {
            id: response.id,
            client_secret,
            amount: response.amount.unwrap_or(request.amount),
            currency: request.currency,
        })
    }

    #[instrument(skip(self, request), fields(lines = request.line_items.len(), currency = %request.currency))]
    async fn create_checkout_session(
        &self,
        request: &SessionRequest,
    ) -> ShopResult<CheckoutSession> {
        let params = Self::session_params(request);
        debug!(
            "Creating Stripe checkout session: {} items, mode={}",
            request.line_items.len(),
            request.mode.as_str()
        );

        let response: StripeCheckoutSessionResponse = self
            .post_form(
                "/v1/checkout/sessions",
                request.currency,
                &request.idempotency_key,
                &params,
            )
            .await?;

        info!("Created Stripe checkout session: id={}", response.id);

        Ok(CheckoutSession {
            session_id: response.id,
            checkout_url: response.url,
        })
    }

    fn publishable_key(&self, currency: Currency) -> ShopResult<String> {
        Ok(self.config.keys_for(currency)?.publishable_key.clone())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePaymentIntentResponse {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_core::{CheckoutMode, FutureUsage, SessionLineItem};
    use std::collections::BTreeMap;

    fn intent_request() -> IntentRequest {
        IntentRequest {
            amount: 1099,
            currency: Currency::USD,
            metadata: BTreeMap::from([("item_id".to_string(), "5".to_string())]),
            setup_future_usage: Some(FutureUsage::OffSession),
            idempotency_key: "key-1".to_string(),
        }
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_intent_params() {
        let params = StripeGateway::intent_params(&intent_request());

        assert_eq!(param(&params, "amount"), Some("1099"));
        assert_eq!(param(&params, "currency"), Some("usd"));
        assert_eq!(param(&params, "setup_future_usage"), Some("off_session"));
        assert_eq!(param(&params, "metadata[item_id]"), Some("5"));
    }

    #[test]
    fn test_intent_params_without_future_usage() {
        let mut request = intent_request();
        request.setup_future_usage = None;

        let params = StripeGateway::intent_params(&request);
        assert_eq!(param(&params, "setup_future_usage"), None);
    }

    #[test]
    fn test_session_params() {
        let request = SessionRequest {
            line_items: vec![
                SessionLineItem {
                    name: "Mug".to_string(),
                    unit_amount: 1099,
                    currency: Currency::EUR,
                    quantity: 2,
                },
                SessionLineItem {
                    name: "Discount".to_string(),
                    unit_amount: -219,
                    currency: Currency::EUR,
                    quantity: 1,
                },
            ],
            currency: Currency::EUR,
            payment_method_types: vec!["card".to_string()],
            mode: CheckoutMode::Payment,
            success_url: "https://shop.example.com/payment-success/".to_string(),
            cancel_url: "https://shop.example.com/payment/cancel/".to_string(),
            metadata: BTreeMap::from([("order_id".to_string(), "3".to_string())]),
            idempotency_key: "key-2".to_string(),
        };

        let params = StripeGateway::session_params(&request);

        assert_eq!(param(&params, "mode"), Some("payment"));
        assert_eq!(param(&params, "payment_method_types[0]"), Some("card"));
        assert_eq!(param(&params, "line_items[0][price_data][currency]"), Some("eur"));
        assert_eq!(param(&params, "line_items[0][price_data][unit_amount]"), Some("1099"));
        assert_eq!(param(&params, "line_items[0][price_data][product_data][name]"), Some("Mug"));
        assert_eq!(param(&params, "line_items[0][quantity]"), Some("2"));
        assert_eq!(param(&params, "line_items[1][price_data][unit_amount]"), Some("-219"));
        assert_eq!(param(&params, "metadata[order_id]"), Some("3"));
        assert_eq!(
            param(&params, "success_url"),
            Some("https://shop.example.com/payment-success/")
        );
    }

    #[test]
    fn test_error_from_response() {
        let err = error_from_response(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"message": "Invalid API Key provided", "type": "invalid_request_error"}}"#,
        );
        assert_eq!(err.to_string(), "Invalid API Key provided");
        assert!(!err.is_retryable());

        let err = error_from_response(StatusCode::BAD_REQUEST, "not json");
        assert_eq!(err.to_string(), "HTTP 400 Bad Request: not json");

        assert!(error_from_response(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(error_from_response(StatusCode::BAD_GATEWAY, "").is_retryable());
    }
}
