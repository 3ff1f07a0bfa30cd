//! # checkout-core
//!
//! Core types and services for the storefront checkout.
//!
//! This crate provides:
//! - `CartStore` for per-user carts with lost-update-free mutations
//! - `PaymentLedger` for the payment state machine (initiate, verify, refund)
//! - `OrderMaterializer` for turning a completed payment into an immutable order
//! - `CheckoutOrchestrator` for the cart → payment → order choreography
//! - `PaymentGateway` trait for plugging in payment providers
//! - `Catalog` trait and the file-backed `ProductCatalog`
//! - Storage ports plus in-memory adapters
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::{CartStore, CheckoutOrchestrator, StartCheckout};
//!
//! // Fill the cart
//! carts.add_item("u1", "prod-A", 2).await?;
//!
//! // Open a payment for the cart total
//! let started = orchestrator.start(request).await?;
//!
//! // Hand started.initiated.next_action to the UI, then confirm the reported outcome
//! let payment = orchestrator.confirm(confirm).await?;
//! ```

pub mod cart;
pub mod cart_store;
pub mod checkout;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod materializer;
pub mod memory;
pub mod order;
pub mod payment;
pub mod product;
pub mod signature;
pub mod store;

// Re-exports for convenience
pub use cart::{Cart, CartLine};
pub use cart_store::CartStore;
pub use checkout::{
    payload_from_cart, CheckoutOrchestrator, CheckoutStarted, ConfirmCheckout, StartCheckout,
};
pub use error::{CheckoutError, CheckoutResult};
pub use gateway::{BoxedPaymentGateway, GatewaySelector, PaymentGateway, ProviderIntent, ProviderReport};
pub use ledger::{InitiatePayment, InitiatedPayment, PaymentLedger, VerifyOutcome, VerifyPayment};
pub use materializer::{generate_order_number, OrderMaterializer, OrderNumberFn};
pub use memory::{InMemoryCartRepository, InMemoryOrderRepository, InMemoryPaymentRepository};
pub use order::{
    CheckoutPayload, Customer, Order, OrderItem, OrderPage, OrderQuery, OrderStatus,
    OrderStatusPolicy, ShippingAddress, StatusChange, TrackingInfo,
};
pub use payment::{NextAction, NextActionKind, Payment, PaymentStatus, ReportedStatus};
pub use product::{Availability, Catalog, CatalogProduct, Currency, ProductCatalog, ProductId};
pub use store::{CartRepository, OrderInsert, OrderRepository, PaymentRepository};
