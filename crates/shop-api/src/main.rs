//! # simple-shop
//!
//! Catalog, cart and Stripe checkout server.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export APP_SECRET_KEY=change-me
//! export STRIPE_SECRET_KEY_USD=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY_USD=pk_test_...
//!
//! # Run the server
//! simple-shop
//! ```

use shop_api::{routes, state::AppState};
use shop_core::Store;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let state = AppState::new().await?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Items loaded: {}", state.store.items().await?.len());
    info!("Payment provider: {}", state.gateway.provider_name());

    let app = routes::create_router(state);

    info!("simple-shop starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Cart: http://{}/cart/", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  simple-shop
  ━━━━━━━━━━━━━━━━━━━━━━━
  Catalog, cart and checkout
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
