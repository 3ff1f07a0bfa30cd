//! # Storage Ports
//!
//! Persistence contracts for carts, payments and orders. Every document carries a `version`
//! and updates go through `compare_and_swap`, which writes only if the stored version still
//! matches the one the caller read. A SQL adapter maps this to
//! `UPDATE ... SET version = version + 1 WHERE id = $1 AND version = $2`.
//!
//! Order inserts must enforce two unique keys atomically: the order number and the
//! checkout key (the id of the payment that produced the order).

use crate::cart::Cart;
use crate::error::CheckoutResult;
use crate::order::{Order, OrderPage, OrderQuery};
use crate::payment::{Payment, PaymentStatus};
use async_trait::async_trait;

/// Cart persistence, keyed by user id
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn load(&self, user_id: &str) -> CheckoutResult<Option<Cart>>;

    /// Store `cart` if the persisted version still equals `cart.version` (0 = absent).
    /// Returns the new version, or `None` when another writer got there first.
    async fn compare_and_swap(&self, cart: &Cart) -> CheckoutResult<Option<u64>>;
}

/// Payment persistence
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a new payment; `Conflict` if the id or provider reference already exists
    async fn insert(&self, payment: &Payment) -> CheckoutResult<u64>;

    async fn get(&self, id: &str) -> CheckoutResult<Option<Payment>>;

    /// Same contract as [`CartRepository::compare_and_swap`]
    async fn compare_and_swap(&self, payment: &Payment) -> CheckoutResult<Option<u64>>;

    /// All payments, newest first, optionally filtered by status
    async fn list(&self, status: Option<PaymentStatus>) -> CheckoutResult<Vec<Payment>>;
}

/// Result of an order insert
#[derive(Debug, Clone)]
pub enum OrderInsert {
    /// Stored with the returned version
    Inserted(u64),
    /// Another order already uses this order number
    NumberTaken,
    /// An order with the same checkout key already exists
    AlreadyMaterialized(Order),
}

/// Order persistence
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> CheckoutResult<OrderInsert>;

    async fn get(&self, id: &str) -> CheckoutResult<Option<Order>>;

    /// Same contract as [`CartRepository::compare_and_swap`]
    async fn compare_and_swap(&self, order: &Order) -> CheckoutResult<Option<u64>>;

    async fn list(&self, query: &OrderQuery) -> CheckoutResult<OrderPage>;
}
