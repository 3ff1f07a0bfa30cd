//! # Payment Types
//!
//! A [`Payment`] is one checkout attempt. Its status follows a small state machine:
//!
//! ```text
//!   pending ──► completed ──► refunded
//!      │
//!      └────► failed
//! ```
//!
//! `failed` and `refunded` are terminal. Re-applying the current status is always allowed
//! so client retries stay idempotent.

use crate::error::{CheckoutError, CheckoutResult};
use crate::product::Currency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Whether `self -> next` is an edge of the state machine
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Completed, PaymentStatus::Refunded)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(CheckoutError::validation(
                "status",
                format!("unknown payment status {:?}", other),
            )),
        }
    }
}

/// Outcome a client (or provider callback) may report for a pending payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportedStatus {
    Completed,
    Failed,
}

impl From<ReportedStatus> for PaymentStatus {
    fn from(value: ReportedStatus) -> Self {
        match value {
            ReportedStatus::Completed => PaymentStatus::Completed,
            ReportedStatus::Failed => PaymentStatus::Failed,
        }
    }
}

/// What the UI should do after initiation. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAction {
    #[serde(rename = "type")]
    pub kind: NextActionKind,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextActionKind {
    /// Hand the URL to a UPI app
    UpiIntent,
    /// Send the browser to the URL
    RedirectUrl,
}

/// A payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,

    pub user_id: String,

    /// Linked order; set at most once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    /// Provider name (e.g., "upi", "phonepe")
    pub provider: String,

    /// Provider-side reference generated at initiation
    pub provider_order_id: String,

    pub amount: i64,

    pub currency: Currency,

    pub status: PaymentStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_payment_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_signature: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency version; 0 means "never persisted"
    #[serde(skip)]
    pub version: u64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Create a new pending payment with a generated ID
    pub fn pending(
        user_id: impl Into<String>,
        provider: impl Into<String>,
        provider_order_id: impl Into<String>,
        amount: i64,
        currency: Currency,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            order_id: None,
            provider: provider.into(),
            provider_order_id: provider_order_id.into(),
            amount,
            currency,
            status: PaymentStatus::Pending,
            provider_payment_id: None,
            provider_signature: None,
            refund_reason: None,
            completed_at: None,
            refunded_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`. Returns `Ok(false)` when the payment already has that status.
    pub fn transition(&mut self, next: PaymentStatus) -> CheckoutResult<bool> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(CheckoutError::InvalidTransition {
                entity: "payment",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        let now = Utc::now();
        match next {
            PaymentStatus::Completed => self.completed_at = Some(now),
            PaymentStatus::Refunded => self.refunded_at = Some(now),
            _ => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(true)
    }

    /// Link an order. Linking the same order again is a no-op; linking a different one fails.
    pub fn link_order(&mut self, order_id: &str) -> CheckoutResult<()> {
        match &self.order_id {
            Some(existing) if existing == order_id => Ok(()),
            Some(existing) => Err(CheckoutError::Conflict(format!(
                "payment {} is already linked to order {}",
                self.id, existing
            ))),
            None => {
                self.order_id = Some(order_id.to_string());
                self.updated_at = Utc::now();
                Ok(())
            }
        }
    }

    /// Whether this payment belongs to `user_id`
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
