//! # Storefront Checkout
//!
//! Cart, payment and order service.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export AUTH_TOKEN_SECRET=$(openssl rand -hex 32)
//! export ORDER_STATUS_POLICY=forward
//! export LOG_FORMAT=json   # optional
//!
//! # Run the server
//! storefront-checkout
//! ```

use checkout_api::{routes, state::AppConfig, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    // Print banner
    print_banner();

    // Initialize application state
    let config = AppConfig::from_env()?;
    let addr = config.socket_addr()?;
    let is_prod = config.is_production();
    let state = AppState::new(config)?;

    info!("Environment: {}", state.config.environment);
    info!("Order status policy: {:?}", state.config.order_status_policy);
    info!("Payment providers: {:?}", state.ledger.providers());

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("🛒 Storefront checkout starting on http://{}", addr);

    if !is_prod {
        info!("📝 Health: http://{}/health", addr);
        info!("💳 Checkout: POST http://{}/checkout/start", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  🛒 Storefront Checkout 🛒
  ━━━━━━━━━━━━━━━━━━━━━━━━━
  Cart · Payments · Orders
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
