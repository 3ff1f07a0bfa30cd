//! # Cart Types
//!
//! Per-user cart document. `total_amount` is derived: every mutating method ends with
//! [`Cart::recompute`], so the stored total always equals `Σ quantity × unit_price`.

use crate::error::{CheckoutError, CheckoutResult};
use crate::product::{CatalogProduct, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One product line in a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product reference (unique within a cart)
    #[serde(rename = "product")]
    pub product_id: ProductId,

    /// Product name at the time the line was created
    pub name: String,

    /// Always >= 1
    pub quantity: u32,

    /// Catalog price snapshotted when the line was created
    #[serde(rename = "price")]
    pub unit_price: i64,

    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Snapshot a catalog product into a new line
    pub fn from_product(product: &CatalogProduct, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity,
            unit_price: product.price,
            added_at: Utc::now(),
        }
    }

    pub fn line_total(&self) -> i64 {
        self.unit_price * i64::from(self.quantity)
    }
}

/// A user's cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user_id: String,

    /// Lines in insertion order
    pub items: Vec<CartLine>,

    pub total_amount: i64,

    /// Optimistic concurrency version; 0 means "never persisted"
    #[serde(skip)]
    pub version: u64,

    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// An empty, not-yet-persisted cart
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            items: Vec::new(),
            total_amount: 0,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Add a product; an existing line for the same product has its quantity increased
    /// and keeps its original price snapshot.
    pub fn add_product(&mut self, product: &CatalogProduct, quantity: u32) -> CheckoutResult<()> {
        if quantity == 0 {
            return Err(CheckoutError::validation(
                "quantity",
                "quantity must be a positive integer",
            ));
        }

        match self.line_mut(&product.id) {
            Some(line) => {
                line.quantity = line.quantity.checked_add(quantity).ok_or_else(|| {
                    CheckoutError::validation("quantity", "quantity is too large")
                })?;
            }
            None => self.items.push(CartLine::from_product(product, quantity)),
        }

        self.recompute();
        Ok(())
    }

    /// Replace a line's quantity; zero removes the line
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> CheckoutResult<()> {
        if quantity == 0 {
            return self.remove_line(product_id);
        }

        let line = self
            .line_mut(product_id)
            .ok_or_else(|| CheckoutError::not_found("Cart item", product_id.as_str()))?;
        line.quantity = quantity;

        self.recompute();
        Ok(())
    }

    /// Remove a line; `NotFound` if the product is not in the cart
    pub fn remove_line(&mut self, product_id: &ProductId) -> CheckoutResult<()> {
        let before = self.items.len();
        self.items.retain(|line| &line.product_id != product_id);
        if self.items.len() == before {
            return Err(CheckoutError::not_found("Cart item", product_id.as_str()));
        }

        self.recompute();
        Ok(())
    }

    /// Drop every line
    pub fn clear(&mut self) {
        self.items.clear();
        self.recompute();
    }

    /// Re-derive the total from the lines
    pub fn recompute(&mut self) {
        self.total_amount = self.items.iter().map(CartLine::line_total).sum();
        self.updated_at = Utc::now();
    }

    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.items.iter().find(|line| &line.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: &ProductId) -> Option<&mut CartLine> {
        self.items
            .iter_mut()
            .find(|line| &line.product_id == product_id)
    }

    /// Sum of all line quantities
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, price: i64) -> CatalogProduct {
        CatalogProduct::active(ProductId::parse(id).unwrap(), format!("Product {}", id), price)
    }

    fn assert_total_consistent(cart: &Cart) {
        let expected: i64 = cart
            .items
            .iter()
            .map(|l| l.unit_price * i64::from(l.quantity))
            .sum();
        assert_eq!(cart.total_amount, expected);
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = Cart::empty("u1");
        let a = product("prod-A", 100);

        cart.add_product(&a, 2).unwrap();
        cart.add_product(&a, 3).unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
        assert_eq!(cart.total_amount, 500);
        assert_total_consistent(&cart);
    }

    #[test]
    fn test_merge_keeps_original_price_snapshot() {
        let mut cart = Cart::empty("u1");
        cart.add_product(&product("prod-A", 100), 1).unwrap();
        cart.add_product(&product("prod-A", 150), 1).unwrap();

        assert_eq!(cart.items[0].unit_price, 100);
        assert_eq!(cart.total_amount, 200);
    }

    #[test]
    fn test_lines_keep_insertion_order() {
        let mut cart = Cart::empty("u1");
        cart.add_product(&product("prod-B", 10), 1).unwrap();
        cart.add_product(&product("prod-A", 20), 1).unwrap();
        cart.add_product(&product("prod-B", 10), 1).unwrap();

        let ids: Vec<_> = cart.items.iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(ids, vec!["prod-B", "prod-A"]);
        assert_total_consistent(&cart);
    }

    #[test]
    fn test_set_quantity_replaces_and_zero_removes() {
        let mut cart = Cart::empty("u1");
        let a = product("prod-A", 100);
        cart.add_product(&a, 2).unwrap();

        cart.set_quantity(&a.id, 7).unwrap();
        assert_eq!(cart.items[0].quantity, 7);
        assert_eq!(cart.total_amount, 700);

        cart.set_quantity(&a.id, 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_amount, 0);
    }

    #[test]
    fn test_set_quantity_missing_line() {
        let mut cart = Cart::empty("u1");
        let err = cart
            .set_quantity(&ProductId::parse("prod-A").unwrap(), 1)
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_remove_twice_reports_not_found() {
        let mut cart = Cart::empty("u1");
        let a = product("prod-A", 100);
        let b = product("prod-B", 40);
        cart.add_product(&a, 1).unwrap();
        cart.add_product(&b, 2).unwrap();

        cart.remove_line(&a.id).unwrap();
        let after_first = cart.clone();

        assert!(cart.remove_line(&a.id).is_err());
        assert_eq!(cart.items, after_first.items);
        assert_eq!(cart.total_amount, 80);
    }

    #[test]
    fn test_zero_quantity_add_rejected() {
        let mut cart = Cart::empty("u1");
        assert!(cart.add_product(&product("prod-A", 1), 0).is_err());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let mut cart = Cart::empty("u1");
        cart.add_product(&product("prod-A", 100), 2).unwrap();

        let value = serde_json::to_value(&cart).unwrap();
        assert_eq!(value["totalAmount"], 200);
        assert_eq!(value["items"][0]["product"], "prod-A");
        assert_eq!(value["items"][0]["quantity"], 2);
        assert_eq!(value["items"][0]["price"], 100);
        assert!(value.get("version").is_none());
    }
}
