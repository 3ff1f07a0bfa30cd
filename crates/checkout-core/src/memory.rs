//! In-memory storage adapters.
//!
//! Each collection sits behind one `tokio::sync::RwLock`; the version check and the write in
//! `compare_and_swap` happen under the same write guard, which makes them atomic.

use crate::cart::Cart;
use crate::error::{CheckoutError, CheckoutResult};
use crate::order::{Order, OrderPage, OrderQuery};
use crate::payment::{Payment, PaymentStatus};
use crate::store::{CartRepository, OrderInsert, OrderRepository, PaymentRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<String, Cart>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn load(&self, user_id: &str) -> CheckoutResult<Option<Cart>> {
        Ok(self.carts.read().await.get(user_id).cloned())
    }

    async fn compare_and_swap(&self, cart: &Cart) -> CheckoutResult<Option<u64>> {
        let mut carts = self.carts.write().await;
        let current = carts.get(&cart.user_id).map(|c| c.version).unwrap_or(0);
        if current != cart.version {
            return Ok(None);
        }

        let mut stored = cart.clone();
        stored.version = current + 1;
        carts.insert(stored.user_id.clone(), stored);
        Ok(Some(current + 1))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPaymentRepository {
    payments: RwLock<HashMap<String, Payment>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, payment: &Payment) -> CheckoutResult<u64> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.id) {
            return Err(CheckoutError::Conflict(format!(
                "payment {} already exists",
                payment.id
            )));
        }
        if payments
            .values()
            .any(|p| p.provider_order_id == payment.provider_order_id)
        {
            return Err(CheckoutError::Conflict(format!(
                "provider reference {} already exists",
                payment.provider_order_id
            )));
        }

        let mut stored = payment.clone();
        stored.version = 1;
        payments.insert(stored.id.clone(), stored);
        Ok(1)
    }

    async fn get(&self, id: &str) -> CheckoutResult<Option<Payment>> {
        Ok(self.payments.read().await.get(id).cloned())
    }

    async fn compare_and_swap(&self, payment: &Payment) -> CheckoutResult<Option<u64>> {
        let mut payments = self.payments.write().await;
        let current = match payments.get(&payment.id) {
            Some(existing) => existing.version,
            None => return Err(CheckoutError::not_found("Payment", payment.id.as_str())),
        };
        if current != payment.version {
            return Ok(None);
        }

        let mut stored = payment.clone();
        stored.version = current + 1;
        payments.insert(stored.id.clone(), stored);
        Ok(Some(current + 1))
    }

    async fn list(&self, status: Option<PaymentStatus>) -> CheckoutResult<Vec<Payment>> {
        let mut matching: Vec<Payment> = self
            .payments
            .read()
            .await
            .values()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> CheckoutResult<OrderInsert> {
        let mut orders = self.orders.write().await;

        if let Some(key) = &order.checkout_key {
            if let Some(existing) = orders
                .values()
                .find(|o| o.checkout_key.as_ref() == Some(key))
            {
                return Ok(OrderInsert::AlreadyMaterialized(existing.clone()));
            }
        }
        if orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Ok(OrderInsert::NumberTaken);
        }

        let mut stored = order.clone();
        stored.version = 1;
        orders.insert(stored.id.clone(), stored);
        Ok(OrderInsert::Inserted(1))
    }

    async fn get(&self, id: &str) -> CheckoutResult<Option<Order>> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn compare_and_swap(&self, order: &Order) -> CheckoutResult<Option<u64>> {
        let mut orders = self.orders.write().await;
        let current = match orders.get(&order.id) {
            Some(existing) => existing.version,
            None => return Err(CheckoutError::not_found("Order", order.id.as_str())),
        };
        if current != order.version {
            return Ok(None);
        }

        let mut stored = order.clone();
        stored.version = current + 1;
        orders.insert(stored.id.clone(), stored);
        Ok(Some(current + 1))
    }

    async fn list(&self, query: &OrderQuery) -> CheckoutResult<OrderPage> {
        let matching: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();
        Ok(OrderPage::paginate(matching, query))
    }
}
