//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the checkout services, the token signer and configuration.

use crate::auth::TokenSigner;
use crate::catalog::{load_product_catalog, HttpCatalog};
use checkout_core::{
    CartStore, Catalog, CheckoutError, CheckoutOrchestrator, CheckoutResult,
    InMemoryCartRepository, InMemoryOrderRepository, InMemoryPaymentRepository,
    OrderMaterializer, OrderStatusPolicy, PaymentLedger,
};
use checkout_gateway::{default_selector, GatewayConfig};
use std::sync::Arc;

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Bearer token signing secret
    pub auth_token_secret: String,
    /// Remote catalog; `config/products.toml` when unset
    pub catalog_url: Option<String>,
    /// Which admin order status changes are allowed
    pub order_status_policy: OrderStatusPolicy,
    /// Payment provider settings
    pub gateways: GatewayConfig,
}

impl AppConfig {
    /// Explicit secret, everything else at its default
    pub fn new(auth_token_secret: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: "development".to_string(),
            auth_token_secret: auth_token_secret.into(),
            catalog_url: None,
            order_status_policy: OrderStatusPolicy::default(),
            gateways: GatewayConfig::default(),
        }
    }

    /// Load from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> CheckoutResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth_token_secret = lookup("AUTH_TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CheckoutError::Configuration(
                    "AUTH_TOKEN_SECRET not set; refusing to start without a token secret"
                        .to_string(),
                )
            })?;

        let port = match lookup("PORT") {
            Some(p) => p.parse().map_err(|_| {
                CheckoutError::Configuration(format!("PORT must be a port number, got {:?}", p))
            })?,
            None => 8080,
        };

        let order_status_policy = match lookup("ORDER_STATUS_POLICY") {
            Some(p) => p.parse()?,
            None => OrderStatusPolicy::default(),
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            auth_token_secret,
            catalog_url: lookup("CATALOG_URL").filter(|u| !u.is_empty()),
            order_status_policy,
            gateways: GatewayConfig::from_lookup(&lookup)?,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> CheckoutResult<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|_| {
            CheckoutError::Configuration(format!(
                "invalid bind address {}:{}",
                self.host, self.port
            ))
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("auth_token_secret", &"***")
            .field("catalog_url", &self.catalog_url)
            .field("order_status_policy", &self.order_status_policy)
            .field("gateways", &self.gateways)
            .finish()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Cart → payment → order choreography
    pub checkout: CheckoutOrchestrator,
    /// Per-user carts
    pub carts: CartStore,
    /// Payment state machine
    pub ledger: PaymentLedger,
    /// Order reads and admin updates
    pub orders: OrderMaterializer,
    /// Bearer token verification
    pub tokens: TokenSigner,
    /// Application config
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Build the state from configuration, picking the catalog it names
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let catalog: Arc<dyn Catalog> = match &config.catalog_url {
            Some(url) => {
                tracing::info!("Using remote catalog at {}", url);
                Arc::new(HttpCatalog::new(url.clone())?)
            }
            None => Arc::new(load_product_catalog()?),
        };
        Ok(Self::with_catalog(config, catalog)?)
    }

    /// Wire in-memory storage around an explicit catalog
    pub fn with_catalog(config: AppConfig, catalog: Arc<dyn Catalog>) -> CheckoutResult<Self> {
        let tokens = TokenSigner::new(&config.auth_token_secret)?;
        let gateways = default_selector(&config.gateways)?;

        let carts = CartStore::new(Arc::new(InMemoryCartRepository::new()), catalog);
        let orders = OrderMaterializer::new(
            Arc::new(InMemoryOrderRepository::new()),
            config.order_status_policy,
        );
        let ledger = PaymentLedger::new(
            Arc::new(InMemoryPaymentRepository::new()),
            orders.clone(),
            gateways,
        );
        let checkout = CheckoutOrchestrator::new(carts.clone(), ledger.clone());

        Ok(Self {
            checkout,
            carts,
            ledger,
            orders,
            tokens,
            config: Arc::new(config),
        })
    }
}
