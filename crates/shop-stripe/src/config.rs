//! # Stripe Configuration
//!
//! Configuration management for Stripe integration.
//! All secrets are loaded from environment variables, one key pair per
//! currency:
//!
//! ```text
//! STRIPE_SECRET_KEY_USD=sk_test_...
//! STRIPE_PUBLISHABLE_KEY_USD=pk_test_...
//! STRIPE_SECRET_KEY_EUR=sk_test_...
//! STRIPE_PUBLISHABLE_KEY_EUR=pk_test_...
//! ```
//!
//! Currencies without their own pair use the default currency's pair.

use shop_core::{Currency, ShopError, ShopResult};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
pub const DEFAULT_API_VERSION: &str = "2024-12-18.acacia";

/// Secret and publishable key for one Stripe account
#[derive(Clone, PartialEq, Eq)]
pub struct StripeKeys {
    /// Secret API key (sk_test_... or sk_live_...)
    pub secret_key: String,

    /// Publishable key (pk_test_... or pk_live_...)
    pub publishable_key: String,
}

impl StripeKeys {
    pub fn new(secret_key: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            publishable_key: publishable_key.into(),
        }
    }

    fn validate(&self, currency: Currency) -> ShopResult<()> {
        if !self.secret_key.starts_with("sk_test_") && !self.secret_key.starts_with("sk_live_") {
            return Err(ShopError::Configuration(format!(
                "STRIPE_SECRET_KEY_{} must start with sk_test_ or sk_live_",
                currency.code()
            )));
        }

        if !self.publishable_key.starts_with("pk_test_")
            && !self.publishable_key.starts_with("pk_live_")
        {
            return Err(ShopError::Configuration(format!(
                "STRIPE_PUBLISHABLE_KEY_{} must start with pk_test_ or pk_live_",
                currency.code()
            )));
        }

        Ok(())
    }
}

// Keys stay out of logs.
impl std::fmt::Debug for StripeKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeKeys")
            .field("secret_key", &"<redacted>")
            .field("publishable_key", &self.publishable_key)
            .finish()
    }
}

/// Retry behaviour for calls that fail with a retryable error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each further failure
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// Stripe API configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Key pair per currency
    pub keys: BTreeMap<Currency, StripeKeys>,

    /// Currency whose key pair serves currencies without their own
    pub default_currency: Currency,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// API version
    pub api_version: String,

    pub retry: RetryPolicy,

    /// Per-request timeout
    pub timeout: Duration,
}

impl StripeConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `STRIPE_SECRET_KEY_USD`
    /// - `STRIPE_PUBLISHABLE_KEY_USD`
    ///
    /// Optional:
    /// - `STRIPE_SECRET_KEY_<CUR>` / `STRIPE_PUBLISHABLE_KEY_<CUR>` for other currencies
    /// - `STRIPE_DEFAULT_CURRENCY` (default `USD`)
    /// - `STRIPE_API_BASE_URL`
    /// - `STRIPE_MAX_ATTEMPTS` (default 3)
    pub fn from_env() -> ShopResult<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ShopResult<Self> {
        let mut keys = BTreeMap::new();

        for currency in Currency::ALL {
            let code = currency.code();
            let secret = lookup(&format!("STRIPE_SECRET_KEY_{}", code));
            let publishable = lookup(&format!("STRIPE_PUBLISHABLE_KEY_{}", code));

            match (secret, publishable) {
                (Some(secret), Some(publishable)) => {
                    let pair = StripeKeys::new(secret, publishable);
                    pair.validate(currency)?;
                    keys.insert(currency, pair);
                }
                (None, None) => {}
                (Some(_), None) => {
                    return Err(ShopError::Configuration(format!(
                        "STRIPE_PUBLISHABLE_KEY_{} not set",
                        code
                    )))
                }
                (None, Some(_)) => {
                    return Err(ShopError::Configuration(format!(
                        "STRIPE_SECRET_KEY_{} not set",
                        code
                    )))
                }
            }
        }

        if !keys.contains_key(&Currency::USD) {
            return Err(ShopError::Configuration(
                "STRIPE_SECRET_KEY_USD not set".to_string(),
            ));
        }

        let default_currency = match lookup("STRIPE_DEFAULT_CURRENCY") {
            Some(raw) => raw.parse::<Currency>().map_err(|_| {
                ShopError::Configuration(format!("STRIPE_DEFAULT_CURRENCY '{}' is not supported", raw))
            })?,
            None => Currency::USD,
        };

        if !keys.contains_key(&default_currency) {
            return Err(ShopError::Configuration(format!(
                "No Stripe keys configured for default currency {}",
                default_currency
            )));
        }

        let mut retry = RetryPolicy::default();
        if let Some(raw) = lookup("STRIPE_MAX_ATTEMPTS") {
            retry.max_attempts = raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ShopError::Configuration(
                        "STRIPE_MAX_ATTEMPTS must be a positive integer".to_string(),
                    )
                })?;
        }

        Ok(Self {
            keys,
            default_currency,
            api_base_url: lookup("STRIPE_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_version: DEFAULT_API_VERSION.to_string(),
            retry,
            timeout: Duration::from_secs(30),
        })
    }

    /// Create config with a single USD key pair (for testing)
    pub fn new(secret_key: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            keys: BTreeMap::from([(Currency::USD, StripeKeys::new(secret_key, publishable_key))]),
            default_currency: Currency::USD,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Key pair for `currency`, falling back to the default currency's pair
    pub fn keys_for(&self, currency: Currency) -> ShopResult<&StripeKeys> {
        self.keys
            .get(&currency)
            .or_else(|| self.keys.get(&self.default_currency))
            .ok_or_else(|| {
                ShopError::Configuration(format!("No Stripe keys configured for {}", currency))
            })
    }

    /// Get authorization header value for `currency`
    pub fn auth_header(&self, currency: Currency) -> ShopResult<String> {
        Ok(format!("Bearer {}", self.keys_for(currency)?.secret_key))
    }

    /// Check if the default key pair is a test key
    pub fn is_test_mode(&self) -> bool {
        self.keys
            .get(&self.default_currency)
            .is_some_and(|k| k.secret_key.starts_with("sk_test_"))
    }

    /// Builder: add a key pair for another currency
    pub fn with_keys(mut self, currency: Currency, keys: StripeKeys) -> Self {
        self.keys.insert(currency, keys);
        self
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder: set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
