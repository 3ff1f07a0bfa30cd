//! # Catalog Adapters
//!
//! Remote catalog over HTTP, plus the loader for the file-backed catalog.

use async_trait::async_trait;
use checkout_core::{Catalog, CatalogProduct, CheckoutError, CheckoutResult, ProductCatalog, ProductId};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument, warn};

/// Catalog service reached at `GET {base_url}/products/{id}`
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    base_url: String,
    client: Client,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| CheckoutError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn lookup_product(&self, id: &ProductId) -> CheckoutResult<Option<CatalogProduct>> {
        let url = format!("{}/products/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CheckoutError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Catalog has no product {}", id);
                Ok(None)
            }
            status if status.is_success() => {
                let product: CatalogProduct =
                    response.json().await.map_err(|e| CheckoutError::Provider {
                        provider: "catalog".to_string(),
                        message: format!("invalid product document: {}", e),
                    })?;
                if &product.id != id {
                    return Err(CheckoutError::Provider {
                        provider: "catalog".to_string(),
                        message: format!("asked for {} but got {}", id, product.id),
                    });
                }
                Ok(Some(product))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CheckoutError::Provider {
                    provider: "catalog".to_string(),
                    message: format!("{}: {}", status, body),
                })
            }
        }
    }
}

/// Load product catalog from config file
pub fn load_product_catalog() -> anyhow::Result<ProductCatalog> {
    // Try to load from config/products.toml
    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = ProductCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            info!("Loaded {} products from {}", catalog.products.len(), path);
            return Ok(catalog);
        }
    }

    // Return empty catalog if no config found
    warn!("No product catalog found, using empty catalog");
    Ok(ProductCatalog::new())
}
