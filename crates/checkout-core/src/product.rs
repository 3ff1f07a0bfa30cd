//! # Product Types
//!
//! Catalog-facing types for the checkout core.
//! The catalog itself is an external collaborator reached through the [`Catalog`] trait;
//! [`ProductCatalog`] is the file-backed implementation loaded from `config/products.toml`.

use crate::error::{CheckoutError, CheckoutResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
    AED,
    SGD,
    JPY,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::INR => "INR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::AED => "AED",
            Currency::SGD => "SGD",
            Currency::JPY => "JPY",
        }
    }

    /// Format an amount for display (e.g. "₹500")
    pub fn display_amount(&self, amount: i64) -> String {
        let symbol = match self {
            Currency::INR => "₹",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::AED => "AED ",
            Currency::SGD => "S$",
            Currency::JPY => "¥",
        };
        format!("{}{}", symbol, amount)
    }
}

impl FromStr for Currency {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Currency::INR),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "AED" => Ok(Currency::AED),
            "SGD" => Ok(Currency::SGD),
            "JPY" => Ok(Currency::JPY),
            other => Err(CheckoutError::validation(
                "currency",
                format!("unsupported currency {:?}", other),
            )),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = CheckoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest product identifier accepted from callers
const MAX_PRODUCT_ID_LEN: usize = 64;

/// A well-formed product identifier.
///
/// Only a single opaque token is accepted: ASCII alphanumerics plus `-`, `_`, `.` and `:`.
/// Stringified objects such as `[object Object]` or JSON fragments are rejected so they can
/// never be silently compared against stored identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    /// Validate a caller-supplied identifier
    pub fn parse(raw: &str) -> CheckoutResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CheckoutError::validation("productId", "product id is required"));
        }
        if trimmed.starts_with("[object") || trimmed.starts_with('{') || trimmed.starts_with('[') {
            return Err(CheckoutError::validation(
                "productId",
                format!(
                    "expected a single product id string but received a serialized object ({:?})",
                    trimmed
                ),
            ));
        }
        if trimmed.len() > MAX_PRODUCT_ID_LEN {
            return Err(CheckoutError::validation(
                "productId",
                format!("product id must be at most {} characters", MAX_PRODUCT_ID_LEN),
            ));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')))
        {
            return Err(CheckoutError::validation(
                "productId",
                format!("product id contains invalid character {:?}", bad),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Validate an identifier that arrived as an arbitrary JSON value
    pub fn from_json(value: &serde_json::Value) -> CheckoutResult<Self> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Null => {
                Err(CheckoutError::validation("productId", "product id is required"))
            }
            serde_json::Value::Object(_) => Err(CheckoutError::validation(
                "productId",
                "expected a product id string but received an object; send the id itself",
            )),
            other => Err(CheckoutError::validation(
                "productId",
                format!("expected a product id string but received {}", json_kind(other)),
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl TryFrom<String> for ProductId {
    type Error = CheckoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductId> for String {
    fn from(value: ProductId) -> Self {
        value.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog availability of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Active,
    Inactive,
    Draft,
    OutOfStock,
    Archived,
}

impl Availability {
    /// Only active products can be put in a cart
    pub fn is_orderable(&self) -> bool {
        matches!(self, Availability::Active)
    }
}

/// What the checkout needs to know about a catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,

    /// Display name (snapshotted into cart lines and orders)
    pub name: String,

    /// Current unit price in the store currency
    pub price: i64,

    #[serde(default)]
    pub status: Availability,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CatalogProduct {
    pub fn active(id: ProductId, name: impl Into<String>, price: i64) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            status: Availability::Active,
            image_url: None,
        }
    }

    /// Builder: set availability
    pub fn with_status(mut self, status: Availability) -> Self {
        self.status = status;
        self
    }
}

/// Product lookup collaborator.
///
/// The cart only ever needs the current price and whether the product is orderable.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a product; `Ok(None)` when the catalog has no such product.
    async fn lookup_product(&self, id: &ProductId) -> CheckoutResult<Option<CatalogProduct>>;
}

/// File-backed catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<CatalogProduct>,
}

impl ProductCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    /// Add a product to the catalog
    pub fn add(&mut self, product: CatalogProduct) {
        self.products.push(product);
    }

    /// Builder: add a product
    pub fn with_product(mut self, product: CatalogProduct) -> Self {
        self.add(product);
        self
    }

    /// Find a product by ID
    pub fn get(&self, id: &ProductId) -> Option<&CatalogProduct> {
        self.products.iter().find(|p| &p.id == id)
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[async_trait]
impl Catalog for ProductCatalog {
    async fn lookup_product(&self, id: &ProductId) -> CheckoutResult<Option<CatalogProduct>> {
        Ok(self.get(id).cloned())
    }
}
