//! # Mock Providers
//!
//! Stand-ins for UPI, PhonePe and Paytm. No provider is contacted: the reference is generated
//! locally and whatever outcome the client reports is accepted.

use async_trait::async_trait;
use checkout_core::{
    CheckoutResult, Currency, NextAction, NextActionKind, Payment, PaymentGateway, ProviderIntent,
    ProviderReport, ReportedStatus,
};
use chrono::Utc;
use rand::Rng;
use tracing::{debug, instrument};

/// Providers served by [`MockGateway`]
pub const MOCK_PROVIDERS: [&str; 3] = ["upi", "phonepe", "paytm"];

/// `<provider>_<epoch millis>_<8 hex digits>`
pub fn provider_reference(provider: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}_{}_{:08x}", provider, Utc::now().timestamp_millis(), suffix)
}

/// UPI gets an intent link, everything else a redirect
pub fn next_action(redirect_base: &str, provider: &str, reference: &str) -> NextAction {
    let kind = if provider == "upi" {
        NextActionKind::UpiIntent
    } else {
        NextActionKind::RedirectUrl
    };
    NextAction {
        kind,
        url: format!("{}/{}", redirect_base, reference),
    }
}

/// Always-succeeds provider
#[derive(Debug, Clone)]
pub struct MockGateway {
    provider: String,
    redirect_base: String,
}

impl MockGateway {
    pub fn new(provider: impl Into<String>, redirect_base: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            redirect_base: redirect_base.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    #[instrument(skip(self), fields(provider = %self.provider))]
    async fn open_intent(
        &self,
        payment_id: &str,
        amount: i64,
        currency: Currency,
    ) -> CheckoutResult<ProviderIntent> {
        let reference = provider_reference(&self.provider);
        debug!("Opened mock intent {}", reference);
        Ok(ProviderIntent {
            next_action: next_action(&self.redirect_base, &self.provider, &reference),
            provider_order_id: reference,
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
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_reference_format() {
        let reference = provider_reference("paytm");
        let parts: Vec<&str> = reference.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "paytm");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
    }

    #[tokio::test]
    async fn test_upi_gets_intent_link() {
        let gateway = MockGateway::new("upi", "https://example.invalid/pay");
        let intent = gateway.open_intent("p1", 500, Currency::INR).await.unwrap();

        assert!(intent.provider_order_id.starts_with("upi_"));
        assert_eq!(intent.next_action.kind, NextActionKind::UpiIntent);
        assert_eq!(
            intent.next_action.url,
            format!("https://example.invalid/pay/{}", intent.provider_order_id)
        );
    }

    #[tokio::test]
    async fn test_wallets_get_redirect_and_trust_report() {
        let gateway = MockGateway::new("phonepe", "https://example.invalid/pay");
        let intent = gateway.open_intent("p1", 500, Currency::INR).await.unwrap();
        assert_eq!(intent.next_action.kind, NextActionKind::RedirectUrl);

        let payment = Payment::pending("u1", "phonepe", intent.provider_order_id, 500, Currency::INR);
        let report = ProviderReport {
            status: ReportedStatus::Completed,
            provider_payment_id: None,
            provider_signature: None,
        };
        assert_eq!(
            gateway.confirm(&payment, &report).await.unwrap(),
            ReportedStatus::Completed
        );
        assert!(!gateway.verifies_signatures());
    }
}
