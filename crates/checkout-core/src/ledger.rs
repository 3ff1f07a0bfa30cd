//! # Payment Ledger
//!
//! Owns payment records and drives their state machine. Initiation asks the selected
//! [`PaymentGateway`](crate::gateway::PaymentGateway) for a provider reference; verification
//! asks it which reported outcome to accept, materializes the order on completion and links
//! it to the payment.
//!
//! ## Exactly-once materialization
//!
//! The payment id doubles as the order's checkout key, and the order store keeps that key
//! unique. A verify that crashed after the order insert but before the payment write leaves
//! an unlinked order behind; the retry gets that same order back from the materializer and
//! links it instead of creating another one.

use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::{GatewaySelector, ProviderReport};
use crate::materializer::OrderMaterializer;
use crate::order::CheckoutPayload;
use crate::payment::{NextAction, Payment, PaymentStatus, ReportedStatus};
use crate::product::Currency;
use crate::store::PaymentRepository;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Upper bound on optimistic retries for one payment update
const MAX_CAS_ATTEMPTS: usize = 16;

/// Request to open a payment
#[derive(Debug, Clone)]
pub struct InitiatePayment {
    pub user_id: String,
    /// Minor units; must be positive
    pub amount: i64,
    pub currency: Currency,
    /// Provider name; the configured default when absent
    pub provider: Option<String>,
    /// Existing order this payment settles
    pub order_id: Option<String>,
}

/// A freshly opened payment plus the UI hint for it
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub payment: Payment,
    pub next_action: NextAction,
}

/// Outcome reported by the client for a payment
#[derive(Debug, Clone)]
pub struct VerifyPayment {
    pub payment_id: String,
    pub user_id: String,
    pub status: ReportedStatus,
    pub provider_payment_id: Option<String>,
    pub provider_signature: Option<String>,
    /// Order to materialize when the payment completes
    pub checkout: Option<CheckoutPayload>,
}

/// Result of [`PaymentLedger::verify`]
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub payment: Payment,
    /// This call moved the payment from `pending` to `completed`; false for retries and for
    /// the losers of a concurrent race
    pub completed_now: bool,
}

/// Payment state machine over a [`PaymentRepository`]
#[derive(Clone)]
pub struct PaymentLedger {
    payments: Arc<dyn PaymentRepository>,
    orders: OrderMaterializer,
    gateways: GatewaySelector,
}

impl PaymentLedger {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        orders: OrderMaterializer,
        gateways: GatewaySelector,
    ) -> Self {
        Self {
            payments,
            orders,
            gateways,
        }
    }

    /// Registered provider names (sorted)
    pub fn providers(&self) -> Vec<String> {
        self.gateways
            .providers()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn default_provider(&self) -> &str {
        self.gateways.default_provider()
    }

    /// Open a pending payment
    #[instrument(skip(self), fields(user_id = %request.user_id, amount = request.amount))]
    pub async fn initiate(&self, request: InitiatePayment) -> CheckoutResult<InitiatedPayment> {
        if request.amount <= 0 {
            return Err(CheckoutError::validation(
                "amount",
                "must be a positive integer amount in minor units",
            ));
        }

        let provider = request
            .provider
            .as_deref()
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty());
        let gateway = self
            .gateways
            .get_or_default(provider.as_deref())
            .ok_or_else(|| {
                CheckoutError::validation(
                    "provider",
                    format!(
                        "unsupported payment provider {:?}; supported: {}",
                        provider.as_deref().unwrap_or(self.gateways.default_provider()),
                        self.gateways.providers().join(", ")
                    ),
                )
            })?;

        if let Some(order_id) = &request.order_id {
            self.orders.get_for_user(order_id, &request.user_id).await?;
        }

        let mut payment = Payment::pending(
            request.user_id,
            gateway.provider_name(),
            String::new(),
            request.amount,
            request.currency,
        );
        let intent = gateway
            .open_intent(&payment.id, payment.amount, payment.currency)
            .await?;
        payment.provider_order_id = intent.provider_order_id;
        payment.order_id = request.order_id;

        payment.version = self.payments.insert(&payment).await?;
        info!(
            "Initiated payment {} via {} for {}",
            payment.id,
            payment.provider,
            payment.currency.display_amount(payment.amount)
        );

        Ok(InitiatedPayment {
            payment,
            next_action: intent.next_action,
        })
    }

    /// Apply a reported outcome; safe to repeat with the same arguments
    #[instrument(skip(self, request), fields(payment_id = %request.payment_id, status = ?request.status))]
    pub async fn verify(&self, request: VerifyPayment) -> CheckoutResult<VerifyOutcome> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let mut payment = self
                .get_for_user(&request.payment_id, &request.user_id)
                .await?;
            let linked_before = payment.order_id.clone();

            let gateway = self.gateways.get(&payment.provider).ok_or_else(|| {
                CheckoutError::Configuration(format!(
                    "payment {} uses unregistered provider {}",
                    payment.id, payment.provider
                ))
            })?;
            let report = ProviderReport {
                status: request.status,
                provider_payment_id: request.provider_payment_id.clone(),
                provider_signature: request.provider_signature.clone(),
            };
            let accepted = gateway.confirm(&payment, &report).await?;

            let changed = payment.transition(accepted.into())?;
            if changed {
                payment.provider_payment_id = request.provider_payment_id.clone();
                payment.provider_signature = request.provider_signature.clone();
            }

            if payment.status == PaymentStatus::Completed {
                self.materialize(&mut payment, request.checkout.as_ref())
                    .await?;
            }

            if !changed && payment.order_id == linked_before {
                debug!("Payment {} already {}, nothing to write", payment.id, payment.status);
                return Ok(VerifyOutcome {
                    payment,
                    completed_now: false,
                });
            }

            match self.payments.compare_and_swap(&payment).await? {
                Some(version) => {
                    payment.version = version;
                    info!(
                        "Payment {} is {} (order: {:?})",
                        payment.id, payment.status, payment.order_id
                    );
                    let completed_now = changed && payment.status == PaymentStatus::Completed;
                    if completed_now {
                        self.settle_linked_order(&payment).await;
                    }
                    return Ok(VerifyOutcome {
                        payment,
                        completed_now,
                    });
                }
                None => debug!(attempt, "Payment version moved underneath us, retrying"),
            }
        }

        Err(CheckoutError::Conflict(format!(
            "payment {} kept changing; gave up after {} attempts",
            request.payment_id, MAX_CAS_ATTEMPTS
        )))
    }

    /// Create-or-find the order for a completed payment and link it
    async fn materialize(
        &self,
        payment: &mut Payment,
        checkout: Option<&CheckoutPayload>,
    ) -> CheckoutResult<()> {
        if payment.order_id.is_some() {
            return Ok(());
        }
        let Some(payload) = checkout else {
            return Ok(());
        };

        if payload.total != payment.amount {
            warn!(
                "Checkout total {} differs from payment {} amount {}",
                payload.total, payment.id, payment.amount
            );
        }
        let order = self
            .orders
            .create(&payment.user_id, Some(&payment.id), payload)
            .await?;
        payment.link_order(&order.id)
    }

    /// Mark the linked order paid. Runs once, after the write that completed the payment; the
    /// payment is already committed, so a failure here is logged rather than returned.
    async fn settle_linked_order(&self, payment: &Payment) {
        let Some(order_id) = &payment.order_id else {
            return;
        };
        if let Err(e) = self.orders.ensure_paid(order_id).await {
            warn!(
                "Payment {} completed but order {} could not be marked paid: {}",
                payment.id, order_id, e
            );
        }
    }

    /// Move a completed payment to `refunded`
    #[instrument(skip(self))]
    pub async fn refund(&self, payment_id: &str, reason: Option<String>) -> CheckoutResult<Payment> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let mut payment = self.get(payment_id).await?;
            if !payment.transition(PaymentStatus::Refunded)? {
                return Ok(payment);
            }
            payment.refund_reason = reason.clone();

            match self.payments.compare_and_swap(&payment).await? {
                Some(version) => {
                    payment.version = version;
                    info!("Refunded payment {}", payment.id);
                    return Ok(payment);
                }
                None => debug!(attempt, "Payment version moved underneath us, retrying"),
            }
        }

        Err(CheckoutError::Conflict(format!(
            "payment {} kept changing; gave up after {} attempts",
            payment_id, MAX_CAS_ATTEMPTS
        )))
    }

    pub async fn get(&self, payment_id: &str) -> CheckoutResult<Payment> {
        self.payments
            .get(payment_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("Payment", payment_id))
    }

    /// Fetch a payment owned by `user_id`; someone else's payment is reported as missing
    pub async fn get_for_user(&self, payment_id: &str, user_id: &str) -> CheckoutResult<Payment> {
        match self.payments.get(payment_id).await? {
            Some(payment) if payment.is_owned_by(user_id) => Ok(payment),
            _ => Err(CheckoutError::not_found("Payment", payment_id)),
        }
    }

    pub async fn list(&self, status: Option<PaymentStatus>) -> CheckoutResult<Vec<Payment>> {
        self.payments.list(status).await
    }
}
