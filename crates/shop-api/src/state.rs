//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the store, cart and checkout services, sessions and configuration.

use crate::session::{SessionStore, DEFAULT_SESSION_TTL};
use axum::extract::FromRef;
use shop_core::{
    CartManager, CatalogSeed, CheckoutService, CheckoutUrls, InMemoryStore, SharedGateway,
    SharedStore, Store,
};
use shop_stripe::StripeGateway;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL for callbacks
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Session cookie signing secret
    pub secret_key: String,
    /// Catalog seed file; the default locations are searched when unset
    pub catalog_path: Option<String>,
    /// Idle time before a visitor session is dropped
    pub session_ttl: Duration,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any variable source.
    ///
    /// `APP_SECRET_KEY` is required; everything else has a default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let secret_key = lookup("APP_SECRET_KEY")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("APP_SECRET_KEY not set"))?;

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT '{}' is not a valid port", raw))?,
            None => 8080,
        };

        let session_ttl = match lookup("SESSION_TTL_SECS") {
            Some(raw) => raw.parse().map(Duration::from_secs).map_err(|_| {
                anyhow::anyhow!("SESSION_TTL_SECS '{}' is not a number of seconds", raw)
            })?,
            None => DEFAULT_SESSION_TTL,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            base_url: lookup("BASE_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            secret_key,
            catalog_path: lookup("CATALOG_PATH"),
            session_ttl,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Item and order storage
    pub store: SharedStore,
    /// Session cart operations
    pub cart: CartManager,
    /// Payment operations
    pub checkout: CheckoutService,
    /// Payment provider, for publishable keys
    pub gateway: SharedGateway,
    /// Visitor sessions
    pub sessions: SessionStore,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create a new AppState with the Stripe gateway and a seeded catalog
    pub async fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let gateway = StripeGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        let store = InMemoryStore::shared();
        seed_catalog(&store, config.catalog_path.as_deref()).await?;

        Self::with_parts(config, store, Arc::new(gateway))
    }

    /// Assemble state from explicit parts (used by tests and alternative backends)
    pub fn with_parts(
        config: AppConfig,
        store: SharedStore,
        gateway: SharedGateway,
    ) -> anyhow::Result<Self> {
        let urls = CheckoutUrls::new(config.base_url.clone());
        let sessions = SessionStore::new(&config.secret_key)?.with_ttl(config.session_ttl);

        Ok(Self {
            cart: CartManager::new(store.clone()),
            checkout: CheckoutService::new(store.clone(), gateway.clone(), urls),
            store,
            gateway,
            sessions,
            config,
        })
    }
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

/// Load the catalog seed into the store; returns how many items were created.
///
/// With no explicit path the usual `config/items.toml` locations are tried, and
/// a missing file leaves the catalog empty.
pub async fn seed_catalog(store: &SharedStore, path: Option<&str>) -> anyhow::Result<usize> {
    let content = match path {
        Some(path) => Some((
            path.to_string(),
            std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?,
        )),
        None => [
            "config/items.toml",
            "../config/items.toml",
            "../../config/items.toml",
        ]
        .into_iter()
        .find_map(|p| std::fs::read_to_string(p).ok().map(|c| (p.to_string(), c))),
    };

    let Some((path, content)) = content else {
        warn!("No catalog seed found, starting with an empty catalog");
        return Ok(0);
    };

    let seed = CatalogSeed::from_toml(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;

    let count = seed.items.len();
    for item in seed.items {
        item.validate()
            .map_err(|e| anyhow::anyhow!("Invalid item '{}' in {}: {}", item.name, path, e))?;
        store.create_item(item).await?;
    }

    info!("Loaded {} items from {}", count, path);
    Ok(count)
}
