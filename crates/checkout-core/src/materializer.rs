//! # Order Materializer
//!
//! Turns a completed payment's checkout payload into a persisted [`Order`], and owns the
//! order's later status and tracking updates.
//!
//! Orders are created directly in `paid`: they only ever exist once a payment completed,
//! so there is no "awaiting payment" stage. A flow that needs a pre-payment order would add
//! that stage in front of `paid` in [`OrderStatus`].

use crate::error::{CheckoutError, CheckoutResult};
use crate::order::{
    CheckoutPayload, Order, OrderPage, OrderQuery, OrderStatus, OrderStatusPolicy, TrackingInfo,
};
use crate::store::{OrderInsert, OrderRepository};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Attempts at finding a free order number before giving up
pub const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Upper bound on optimistic retries for status/tracking updates
const MAX_CAS_ATTEMPTS: usize = 16;

/// Source of candidate order numbers
pub type OrderNumberFn = Arc<dyn Fn() -> String + Send + Sync>;

/// `ORD-<last 6 digits of epoch millis>-<6 random hex digits>`
pub fn generate_order_number() -> String {
    let millis = Utc::now().timestamp_millis().rem_euclid(1_000_000);
    let suffix: u32 = rand::thread_rng().gen_range(0..=0x00FF_FFFF);
    format!("ORD-{:06}-{:06X}", millis, suffix)
}

/// Creates and updates orders
#[derive(Clone)]
pub struct OrderMaterializer {
    repo: Arc<dyn OrderRepository>,
    policy: OrderStatusPolicy,
    numbers: OrderNumberFn,
}

impl OrderMaterializer {
    pub fn new(repo: Arc<dyn OrderRepository>, policy: OrderStatusPolicy) -> Self {
        Self {
            repo,
            policy,
            numbers: Arc::new(generate_order_number),
        }
    }

    /// Builder: replace the order number source
    pub fn with_number_generator(mut self, numbers: OrderNumberFn) -> Self {
        self.numbers = numbers;
        self
    }

    /// Validate `payload` and persist a paid order.
    ///
    /// `checkout_key` is the id of the payment that produced the order. If an order with the
    /// same key already exists it is returned instead of creating a second one.
    #[instrument(skip(self, payload), fields(items = payload.items.len(), total = payload.total))]
    pub async fn create(
        &self,
        user_id: &str,
        checkout_key: Option<&str>,
        payload: &CheckoutPayload,
    ) -> CheckoutResult<Order> {
        payload.validate()?;

        for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
            let order = Order::paid(
                (self.numbers)(),
                user_id,
                checkout_key.map(str::to_string),
                payload,
            );

            match self.repo.insert(&order).await? {
                OrderInsert::Inserted(version) => {
                    info!(
                        "Materialized order {} ({}) units={} total={}",
                        order.order_number,
                        order.id,
                        order.item_count(),
                        order.currency.display_amount(order.total)
                    );
                    return Ok(Order { version, ..order });
                }
                OrderInsert::AlreadyMaterialized(existing) => {
                    info!(
                        "Order {} already materialized for checkout {:?}",
                        existing.order_number, checkout_key
                    );
                    return Ok(existing);
                }
                OrderInsert::NumberTaken => {
                    warn!(attempt, "Order number {} already taken", order.order_number);
                }
            }
        }

        Err(CheckoutError::Conflict(format!(
            "could not assign a unique order number after {} attempts",
            MAX_ORDER_NUMBER_ATTEMPTS
        )))
    }

    pub async fn get(&self, order_id: &str) -> CheckoutResult<Order> {
        self.repo
            .get(order_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Order", order_id))
    }

    /// Fetch an order owned by `user_id`; someone else's order is reported as missing
    pub async fn get_for_user(&self, order_id: &str, user_id: &str) -> CheckoutResult<Order> {
        match self.repo.get(order_id).await? {
            Some(order) if order.user_id == user_id => Ok(order),
            _ => Err(CheckoutError::not_found("Order", order_id)),
        }
    }

    pub async fn list(&self, query: &OrderQuery) -> CheckoutResult<OrderPage> {
        self.repo.list(query).await
    }

    /// Admin status change, subject to the configured policy
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        note: Option<String>,
    ) -> CheckoutResult<Order> {
        let policy = self.policy;
        let order = self
            .update(order_id, |order| {
                order.change_status(status, policy, note.clone()).map(|_| ())
            })
            .await?;
        info!("Order {} is now {}", order.order_number, order.status);
        Ok(order)
    }

    /// Cancel an order
    pub async fn cancel(&self, order_id: &str) -> CheckoutResult<Order> {
        self.update_status(
            order_id,
            OrderStatus::Cancelled,
            Some("Cancelled".to_string()),
        )
        .await
    }

    /// Attach courier tracking
    #[instrument(skip(self))]
    pub async fn update_tracking(
        &self,
        order_id: &str,
        tracking: TrackingInfo,
    ) -> CheckoutResult<Order> {
        if tracking.tracking_number.trim().is_empty() {
            return Err(CheckoutError::validation(
                "trackingNumber",
                "tracking number is required",
            ));
        }
        self.update(order_id, |order| {
            order.set_tracking(tracking.clone());
            Ok(())
        })
        .await
    }

    /// Move a linked order to `paid` once its payment completed.
    ///
    /// Under the forward policy an order already past `paid` keeps its stage; the skip is
    /// logged. Under the unrestricted policy the status is overwritten.
    #[instrument(skip(self))]
    pub async fn ensure_paid(&self, order_id: &str) -> CheckoutResult<Order> {
        let order = self.get(order_id).await?;
        if order.status == OrderStatus::Paid {
            return Ok(order);
        }

        let policy = self.policy;
        if !policy.allows(order.status, OrderStatus::Paid) {
            info!(
                "Order {} is {}; {:?} policy keeps it there after payment",
                order.order_number, order.status, policy
            );
            return Ok(order);
        }

        let order = self
            .update(order_id, |order| {
                if policy.allows(order.status, OrderStatus::Paid) {
                    order.change_status(
                        OrderStatus::Paid,
                        policy,
                        Some("Payment completed".to_string()),
                    )?;
                }
                Ok(())
            })
            .await?;
        info!("Order {} marked paid", order.order_number);
        Ok(order)
    }

    async fn update<F>(&self, order_id: &str, apply: F) -> CheckoutResult<Order>
    where
        F: Fn(&mut Order) -> CheckoutResult<()>,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let mut order = self.get(order_id).await?;
            apply(&mut order)?;

            match self.repo.compare_and_swap(&order).await? {
                Some(version) => {
                    order.version = version;
                    return Ok(order);
                }
                None => debug!(attempt, "Order version moved underneath us, retrying"),
            }
        }

        Err(CheckoutError::Conflict(format!(
            "order {} kept changing; gave up after {} attempts",
            order_id, MAX_CAS_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryOrderRepository;
    use crate::order::fixtures::payload;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn materializer() -> (OrderMaterializer, Arc<InMemoryOrderRepository>) {
        let repo = Arc::new(InMemoryOrderRepository::new());
        (
            OrderMaterializer::new(repo.clone(), OrderStatusPolicy::Forward),
            repo,
        )
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_create_paid_order() {
        let (materializer, _) = materializer();
        let order = materializer
            .create("u1", Some("pay-1"), &payload(500))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.total, 500);
        assert!(order.order_number.starts_with("ORD-"));
        assert_eq!(materializer.get(&order.id).await.unwrap().id, order.id);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_payload() {
        let (materializer, repo) = materializer();
        let mut bad = payload(500);
        bad.items.clear();

        let err = materializer.create("u1", None, &bad).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_same_checkout_key_returns_existing_order() {
        let (materializer, repo) = materializer();
        let first = materializer
            .create("u1", Some("pay-1"), &payload(500))
            .await
            .unwrap();
        let second = materializer
            .create("u1", Some("pay-1"), &payload(500))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_number_collision_is_retried() {
        let (materializer, repo) = materializer();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let materializer = materializer.with_number_generator(Arc::new(move || {
            // Two colliding candidates, then a fresh one
            match counter.fetch_add(1, Ordering::SeqCst) {
                0..=2 => "ORD-000001-AAAAAA".to_string(),
                n => format!("ORD-000001-{:06X}", n),
            }
        }));

        materializer.create("u1", None, &payload(100)).await.unwrap();
        let second = materializer.create("u1", None, &payload(100)).await.unwrap();

        assert_eq!(second.order_number, "ORD-000001-000003");
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_number_collision_gives_up() {
        let (materializer, _) = materializer();
        let materializer = materializer
            .with_number_generator(Arc::new(|| "ORD-000001-AAAAAA".to_string()));

        materializer.create("u1", None, &payload(100)).await.unwrap();
        let err = materializer.create("u1", None, &payload(100)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Conflict(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_get_distinct_numbers() {
        let (materializer, repo) = materializer();
        let mut handles = Vec::new();
        for i in 0..100 {
            let m = materializer.clone();
            handles.push(tokio::spawn(async move {
                m.create("u1", Some(&format!("pay-{}", i)), &payload(100))
                    .await
            }));
        }

        let mut numbers = HashSet::new();
        for handle in handles {
            let order = handle.await.unwrap().unwrap();
            assert!(numbers.insert(order.order_number));
        }
        assert_eq!(numbers.len(), 100);
        assert_eq!(repo.len().await, 100);
    }

    #[tokio::test]
    async fn test_status_updates_follow_policy() {
        let (materializer, _) = materializer();
        let order = materializer.create("u1", None, &payload(100)).await.unwrap();

        let shipped = materializer
            .update_status(&order.id, OrderStatus::Shipped, None)
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);

        let err = materializer
            .update_status(&order.id, OrderStatus::Packed, None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let cancelled = materializer.cancel(&order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.status_history.len(), 3);
    }

    #[tokio::test]
    async fn test_unrestricted_policy_allows_overwrite() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let materializer = OrderMaterializer::new(repo, OrderStatusPolicy::Unrestricted);
        let order = materializer.create("u1", None, &payload(100)).await.unwrap();

        materializer.cancel(&order.id).await.unwrap();
        let back = materializer
            .update_status(&order.id, OrderStatus::Paid, None)
            .await
            .unwrap();
        assert_eq!(back.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_ensure_paid_respects_policy() {
        let (forward, _) = materializer();
        let order = forward.create("u1", None, &payload(100)).await.unwrap();
        forward
            .update_status(&order.id, OrderStatus::Packed, None)
            .await
            .unwrap();
        let kept = forward.ensure_paid(&order.id).await.unwrap();
        assert_eq!(kept.status, OrderStatus::Packed);
        assert_eq!(kept.status_history.len(), 2);

        let repo = Arc::new(InMemoryOrderRepository::new());
        let unrestricted = OrderMaterializer::new(repo, OrderStatusPolicy::Unrestricted);
        let order = unrestricted.create("u1", None, &payload(100)).await.unwrap();
        unrestricted
            .update_status(&order.id, OrderStatus::Packed, None)
            .await
            .unwrap();
        let paid = unrestricted.ensure_paid(&order.id).await.unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert_eq!(paid.status_history.len(), 3);

        // Already paid: nothing is appended
        let again = unrestricted.ensure_paid(&order.id).await.unwrap();
        assert_eq!(again.status_history.len(), 3);
    }

    #[tokio::test]
    async fn test_tracking_and_ownership() {
        let (materializer, _) = materializer();
        let order = materializer.create("u1", None, &payload(100)).await.unwrap();

        let err = materializer
            .update_tracking(
                &order.id,
                TrackingInfo {
                    tracking_number: " ".into(),
                    courier_name: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("trackingNumber"));

        let tracked = materializer
            .update_tracking(
                &order.id,
                TrackingInfo {
                    tracking_number: "BD123456789IN".into(),
                    courier_name: Some("BlueDart".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            tracked.tracking.map(|t| t.tracking_number).as_deref(),
            Some("BD123456789IN")
        );

        assert!(materializer.get_for_user(&order.id, "u1").await.is_ok());
        assert_eq!(
            materializer
                .get_for_user(&order.id, "u2")
                .await
                .unwrap_err()
                .status_code(),
            404
        );
    }
}
