//! # Payment Gateway Trait
//!
//! Strategy trait for payment providers. The ledger's state machine never talks to a
//! provider directly; it asks a gateway to open an intent at initiation and to confirm the
//! outcome a client reports at verification.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentGateway (trait)                   │
//! │  ├── open_intent()                                          │
//! │  ├── confirm()                                              │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!          ┌─────────────────┼─────────────────┐
//!          │                 │                 │
//!  ┌───────┴───────┐ ┌───────┴───────┐ ┌───────┴───────┐
//!  │  MockGateway  │ │ SignedGateway │ │ live provider │
//!  │ upi/phonepe/  │ │  (razorpay)   │ │   (future)    │
//!  │    paytm      │ │               │ │               │
//!  └───────────────┘ └───────────────┘ └───────────────┘
//! ```

use crate::error::CheckoutResult;
use crate::payment::{NextAction, Payment, ReportedStatus};
use crate::product::Currency;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a provider hands back when a payment is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIntent {
    /// Opaque provider-side reference
    pub provider_order_id: String,
    /// Advisory hint for the UI
    pub next_action: NextAction,
}

/// What the client claims happened at the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReport {
    pub status: ReportedStatus,
    pub provider_payment_id: Option<String>,
    pub provider_signature: Option<String>,
}

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a provider-side intent for a new payment.
    async fn open_intent(
        &self,
        payment_id: &str,
        amount: i64,
        currency: Currency,
    ) -> CheckoutResult<ProviderIntent>;

    /// Decide which outcome to accept for a client report.
    ///
    /// Returns the status the ledger should apply, or `VerificationFailed` when the report
    /// cannot be trusted.
    async fn confirm(
        &self,
        payment: &Payment,
        report: &ProviderReport,
    ) -> CheckoutResult<ReportedStatus>;

    /// Provider name (for logging and routing).
    fn provider_name(&self) -> &str;

    /// Whether `confirm` checks a provider signature instead of trusting the client.
    fn verifies_signatures(&self) -> bool {
        false
    }
}

/// Type alias for a boxed gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

/// Gateway selector for multiple providers
#[derive(Clone)]
pub struct GatewaySelector {
    gateways: BTreeMap<String, BoxedPaymentGateway>,
    default_provider: String,
}

impl GatewaySelector {
    /// Create a new selector with a default provider
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            gateways: BTreeMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a gateway
    pub fn register(&mut self, gateway: BoxedPaymentGateway) {
        let name = gateway.provider_name().to_string();
        self.gateways.insert(name, gateway);
    }

    /// Register with builder pattern
    pub fn with_gateway(mut self, gateway: BoxedPaymentGateway) -> Self {
        self.register(gateway);
        self
    }

    /// Get a gateway by provider name
    pub fn get(&self, provider: &str) -> Option<&BoxedPaymentGateway> {
        self.gateways.get(provider)
    }

    /// Get the named gateway, or the default when no name is given.
    ///
    /// An unknown name does not fall back: the caller asked for a specific provider.
    pub fn get_or_default(&self, provider: Option<&str>) -> Option<&BoxedPaymentGateway> {
        match provider {
            Some(p) => self.get(p),
            None => self.get(&self.default_provider),
        }
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// List all registered providers (sorted)
    pub fn providers(&self) -> Vec<&str> {
        self.gateways.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a provider is registered
    pub fn has_provider(&self, provider: &str) -> bool {
        self.gateways.contains_key(provider)
    }
}

impl std::fmt::Debug for GatewaySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySelector")
            .field("providers", &self.providers())
            .field("default_provider", &self.default_provider)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::NextActionKind;

    struct FixedGateway(&'static str);

    #[async_trait]
    impl PaymentGateway for FixedGateway {
        async fn open_intent(
            &self,
            payment_id: &str,
            _amount: i64,
            _currency: Currency,
        ) -> CheckoutResult<ProviderIntent> {
            Ok(ProviderIntent {
                provider_order_id: format!("{}_{}", self.0, payment_id),
                next_action: NextAction {
                    kind: NextActionKind::RedirectUrl,
                    url: "https://example.invalid".into(),
                },
            })
        }

        async fn confirm(
            &self,
            _payment: &Payment,
            report: &ProviderReport,
        ) -> CheckoutResult<ReportedStatus> {
            Ok(report.status)
        }

        fn provider_name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_gateway_selector() {
        let selector = GatewaySelector::new("upi")
            .with_gateway(Arc::new(FixedGateway("upi")))
            .with_gateway(Arc::new(FixedGateway("paytm")));

        assert_eq!(selector.providers(), vec!["paytm", "upi"]);
        assert!(selector.has_provider("paytm"));
        assert_eq!(
            selector.get_or_default(None).map(|g| g.provider_name()),
            Some("upi")
        );
        assert!(selector.get_or_default(Some("stripe")).is_none());
    }

    #[test]
    fn test_empty_selector() {
        let selector = GatewaySelector::new("upi");
        assert!(selector.providers().is_empty());
        assert!(selector.get_or_default(None).is_none());
    }
}
