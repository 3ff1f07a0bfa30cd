//! # Cart Store
//!
//! The only component that mutates cart lines. Every mutation is an optimistic
//! read-modify-write: load the cart with its version, apply the change in memory, then
//! `compare_and_swap`. A lost race reloads and re-applies the change, so two concurrent
//! `add_item` calls for the same product always end with the sum of both quantities.

use crate::cart::Cart;
use crate::error::{CheckoutError, CheckoutResult};
use crate::product::{Catalog, ProductId};
use crate::store::CartRepository;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Upper bound on optimistic retries before a mutation gives up with `Conflict`
const MAX_CAS_ATTEMPTS: usize = 32;

/// Per-user cart operations
#[derive(Clone)]
pub struct CartStore {
    repo: Arc<dyn CartRepository>,
    catalog: Arc<dyn Catalog>,
}

impl CartStore {
    pub fn new(repo: Arc<dyn CartRepository>, catalog: Arc<dyn Catalog>) -> Self {
        Self { repo, catalog }
    }

    /// The user's cart, or an empty one if nothing was ever added
    pub async fn get_cart(&self, user_id: &str) -> CheckoutResult<Cart> {
        Ok(self
            .repo
            .load(user_id)
            .await?
            .unwrap_or_else(|| Cart::empty(user_id)))
    }

    /// Sum of line quantities
    pub async fn item_count(&self, user_id: &str) -> CheckoutResult<u32> {
        Ok(self.get_cart(user_id).await?.item_count())
    }

    /// Add `quantity` units of a product, snapshotting its current price on a new line
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> CheckoutResult<Cart> {
        let product_id = ProductId::parse(product_id)?;
        let quantity = positive_quantity(quantity)?;

        let product = self
            .catalog
            .lookup_product(&product_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Product", product_id.as_str()))?;
        if !product.status.is_orderable() {
            return Err(CheckoutError::Unavailable {
                product_id: product_id.to_string(),
            });
        }

        let cart = self
            .mutate(user_id, true, |cart| cart.add_product(&product, quantity))
            .await?;

        info!(
            "Added {} x {} to cart, total={}",
            quantity, product_id, cart.total_amount
        );
        Ok(cart)
    }

    /// Replace a line's quantity; `0` removes the line
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> CheckoutResult<Cart> {
        let product_id = ProductId::parse(product_id)?;
        if quantity < 0 {
            return Err(CheckoutError::validation(
                "quantity",
                "quantity must not be negative",
            ));
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| CheckoutError::validation("quantity", "quantity is too large"))?;

        self.mutate(user_id, false, |cart| {
            cart.set_quantity(&product_id, quantity)
        })
        .await
    }

    /// Remove a line; `NotFound` if the cart or the line does not exist
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: &str, product_id: &str) -> CheckoutResult<Cart> {
        let product_id = ProductId::parse(product_id)?;
        self.mutate(user_id, false, |cart| cart.remove_line(&product_id))
            .await
    }

    /// Empty the cart. Idempotent; never creates a cart that did not exist.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: &str) -> CheckoutResult<Cart> {
        match self.mutate(user_id, false, |cart| {
            cart.clear();
            Ok(())
        })
        .await
        {
            Ok(cart) => {
                info!("Cleared cart");
                Ok(cart)
            }
            Err(CheckoutError::NotFound { entity: "Cart", .. }) => Ok(Cart::empty(user_id)),
            Err(e) => Err(e),
        }
    }

    /// Optimistic read-modify-write loop around `apply`
    async fn mutate<F>(&self, user_id: &str, create_if_missing: bool, apply: F) -> CheckoutResult<Cart>
    where
        F: Fn(&mut Cart) -> CheckoutResult<()>,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let mut cart = match self.repo.load(user_id).await? {
                Some(cart) => cart,
                None if create_if_missing => Cart::empty(user_id),
                None => return Err(CheckoutError::not_found("Cart", user_id)),
            };

            apply(&mut cart)?;

            match self.repo.compare_and_swap(&cart).await? {
                Some(version) => {
                    cart.version = version;
                    return Ok(cart);
                }
                None => debug!(attempt, "Cart version moved underneath us, retrying"),
            }
        }

        Err(CheckoutError::Conflict(format!(
            "cart for user {} kept changing; gave up after {} attempts",
            user_id, MAX_CAS_ATTEMPTS
        )))
    }
}

fn positive_quantity(quantity: i64) -> CheckoutResult<u32> {
    if quantity < 1 {
        return Err(CheckoutError::validation(
            "quantity",
            "quantity must be a positive integer",
        ));
    }
    u32::try_from(quantity)
        .map_err(|_| CheckoutError::validation("quantity", "quantity is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCartRepository;
    use crate::product::{Availability, CatalogProduct, ProductCatalog};
    use async_trait::async_trait;
    use tokio::sync::RwLock;

    /// Catalog whose prices can change mid-test
    #[derive(Default)]
    struct MutableCatalog(RwLock<ProductCatalog>);

    impl MutableCatalog {
        async fn set(&self, id: &str, price: i64, status: Availability) {
            let mut catalog = self.0.write().await;
            let id = ProductId::parse(id).unwrap();
            catalog.products.retain(|p| p.id != id);
            catalog.add(CatalogProduct::active(id.clone(), format!("Product {}", id), price).with_status(status));
        }
    }

    #[async_trait]
    impl Catalog for MutableCatalog {
        async fn lookup_product(
            &self,
            id: &ProductId,
        ) -> CheckoutResult<Option<CatalogProduct>> {
            self.0.read().await.lookup_product(id).await
        }
    }

    async fn store() -> (CartStore, Arc<MutableCatalog>) {
        let catalog = Arc::new(MutableCatalog::default());
        catalog.set("prod-A", 100, Availability::Active).await;
        catalog.set("prod-B", 40, Availability::Active).await;
        catalog.set("prod-X", 999, Availability::Inactive).await;
        let store = CartStore::new(Arc::new(InMemoryCartRepository::new()), catalog.clone());
        (store, catalog)
    }

    fn assert_total_consistent(cart: &Cart) {
        let expected: i64 = cart
            .items
            .iter()
            .map(|l| l.unit_price * i64::from(l.quantity))
            .sum();
        assert_eq!(cart.total_amount, expected);
    }

    #[tokio::test]
    async fn test_get_cart_without_cart_is_empty() {
        let (store, _) = store().await;
        let cart = store.get_cart("u1").await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_amount, 0);
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let (store, _) = store().await;
        store.add_item("u1", "prod-A", 2).await.unwrap();

        let cart = store.get_cart("u1").await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id.as_str(), "prod-A");
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(cart.items[0].unit_price, 100);
        assert_eq!(cart.total_amount, 200);
    }

    #[tokio::test]
    async fn test_update_to_zero_empties_cart() {
        let (store, _) = store().await;
        store.add_item("u1", "prod-A", 2).await.unwrap();

        let cart = store.update_item("u1", "prod-A", 0).await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_amount, 0);
    }

    #[tokio::test]
    async fn test_update_replaces_quantity() {
        let (store, _) = store().await;
        store.add_item("u1", "prod-A", 2).await.unwrap();
        let cart = store.update_item("u1", "prod-A", 5).await.unwrap();
        assert_eq!(cart.items[0].quantity, 5);
        assert_total_consistent(&cart);
    }

    #[tokio::test]
    async fn test_update_validation_and_not_found() {
        let (store, _) = store().await;
        assert_eq!(
            store.update_item("u1", "prod-A", 1).await.unwrap_err().status_code(),
            404
        );

        store.add_item("u1", "prod-A", 1).await.unwrap();
        assert_eq!(
            store.update_item("u1", "prod-A", -1).await.unwrap_err().status_code(),
            400
        );
        assert_eq!(
            store.update_item("u1", "prod-B", 1).await.unwrap_err().status_code(),
            404
        );
    }

    #[tokio::test]
    async fn test_add_rejects_bad_input() {
        let (store, _) = store().await;
        assert_eq!(
            store.add_item("u1", "prod-A", 0).await.unwrap_err().status_code(),
            400
        );
        assert!(matches!(
            store.add_item("u1", "prod-Z", 1).await.unwrap_err(),
            CheckoutError::NotFound { .. }
        ));
        assert!(matches!(
            store.add_item("u1", "prod-X", 1).await.unwrap_err(),
            CheckoutError::Unavailable { .. }
        ));
        assert!(store.get_cart("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_change_does_not_touch_existing_lines() {
        let (store, catalog) = store().await;
        store.add_item("u1", "prod-A", 1).await.unwrap();
        catalog.set("prod-A", 250, Availability::Active).await;

        let cart = store.add_item("u1", "prod-A", 1).await.unwrap();
        assert_eq!(cart.items[0].unit_price, 100);
        assert_eq!(cart.total_amount, 200);
    }

    #[tokio::test]
    async fn test_remove_twice() {
        let (store, _) = store().await;
        store.add_item("u1", "prod-A", 1).await.unwrap();
        store.add_item("u1", "prod-B", 2).await.unwrap();

        let first = store.remove_item("u1", "prod-A").await.unwrap();
        let err = store.remove_item("u1", "prod-A").await.unwrap_err();
        assert_eq!(err.status_code(), 404);

        let after = store.get_cart("u1").await.unwrap();
        assert_eq!(after.items, first.items);
        assert_eq!(after.total_amount, 80);
    }

    #[tokio::test]
    async fn test_remove_rejects_serialized_object() {
        let (store, _) = store().await;
        store.add_item("u1", "prod-A", 1).await.unwrap();
        let before = store.get_cart("u1").await.unwrap();

        let err = store.remove_item("u1", "[object Object]").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.field(), Some("productId"));

        let after = store.get_cart("u1").await.unwrap();
        assert_eq!(after.items, before.items);
    }

    #[tokio::test]
    async fn test_remove_without_cart() {
        let (store, _) = store().await;
        let err = store.remove_item("u1", "prod-A").await.unwrap_err();
        assert!(matches!(err, CheckoutError::NotFound { entity: "Cart", .. }));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (store, _) = store().await;
        assert!(store.clear("nobody").await.unwrap().is_empty());

        store.add_item("u1", "prod-A", 3).await.unwrap();
        let cleared = store.clear("u1").await.unwrap();
        assert!(cleared.is_empty());
        assert_eq!(cleared.total_amount, 0);
        assert!(store.clear("u1").await.unwrap().is_empty());
        assert_eq!(store.item_count("u1").await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_do_not_lose_updates() {
        for _ in 0..50 {
            let (store, _) = store().await;
            let a = store.clone();
            let b = store.clone();

            let (r1, r2) = tokio::join!(
                tokio::spawn(async move { a.add_item("u1", "prod-A", 2).await }),
                tokio::spawn(async move { b.add_item("u1", "prod-A", 3).await }),
            );
            r1.unwrap().unwrap();
            r2.unwrap().unwrap();

            let cart = store.get_cart("u1").await.unwrap();
            assert_eq!(cart.items.len(), 1);
            assert_eq!(cart.items[0].quantity, 5);
            assert_eq!(cart.total_amount, 500);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_mutations_keep_total_consistent() {
        let (store, _) = store().await;
        let mut handles = Vec::new();
        for i in 0..20 {
            let s = store.clone();
            let product = if i % 2 == 0 { "prod-A" } else { "prod-B" };
            handles.push(tokio::spawn(async move { s.add_item("u1", product, 1).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let cart = store.get_cart("u1").await.unwrap();
        assert_eq!(cart.item_count(), 20);
        assert_eq!(cart.total_amount, 10 * 100 + 10 * 40);
    }
}
