//! # Signature-Verified Provider
//!
//! Razorpay-style checkout: the provider returns `razorpay_payment_id` and
//! `razorpay_signature` to the client, where the signature is
//! `hex(HMAC-SHA256(key_secret, "<order_id>|<payment_id>"))`. A completion is only accepted
//! when that signature checks out, so the client can no longer simply claim success.

use crate::mock::{next_action, provider_reference};
use async_trait::async_trait;
use checkout_core::signature::{compute_hmac_sha256, constant_time_compare};
use checkout_core::{
    CheckoutError, CheckoutResult, Currency, Payment, PaymentGateway, ProviderIntent,
    ProviderReport, ReportedStatus,
};
use tracing::{debug, instrument, warn};

pub const SIGNED_PROVIDER: &str = "razorpay";

/// Provider that verifies an HMAC before accepting `completed`
pub struct SignedGateway {
    key_secret: String,
    redirect_base: String,
}

impl SignedGateway {
    pub fn new(key_secret: impl Into<String>, redirect_base: impl Into<String>) -> Self {
        Self {
            key_secret: key_secret.into(),
            redirect_base: redirect_base.into(),
        }
    }

    /// Signature the provider attaches to a successful payment
    pub fn sign(&self, provider_order_id: &str, provider_payment_id: &str) -> CheckoutResult<String> {
        let message = format!("{}|{}", provider_order_id, provider_payment_id);
        compute_hmac_sha256(self.key_secret.as_bytes(), message.as_bytes())
    }
}

#[async_trait]
impl PaymentGateway for SignedGateway {
    #[instrument(skip(self))]
    async fn open_intent(
        &self,
        payment_id: &str,
        amount: i64,
        currency: Currency,
    ) -> CheckoutResult<ProviderIntent> {
        let reference = provider_reference(SIGNED_PROVIDER);
        debug!("Opened signed intent {}", reference);
        Ok(ProviderIntent {
            next_action: next_action(&self.redirect_base, SIGNED_PROVIDER, &reference),
            provider_order_id: reference,
        })
    }

    #[instrument(skip(self, payment, report), fields(payment_id = %payment.id))]
    async fn confirm(
        &self,
        payment: &Payment,
        report: &ProviderReport,
    ) -> CheckoutResult<ReportedStatus> {
        if report.status == ReportedStatus::Failed {
            return Ok(ReportedStatus::Failed);
        }

        let (payment_ref, signature) = match (
            report.provider_payment_id.as_deref(),
            report.provider_signature.as_deref(),
        ) {
            (Some(p), Some(s)) => (p, s),
            _ => {
                return Err(CheckoutError::VerificationFailed(
                    "providerPaymentId and providerSignature are required".to_string(),
                ))
            }
        };

        let expected = self.sign(&payment.provider_order_id, payment_ref)?;
        if !constant_time_compare(signature, &expected) {
            warn!("Signature mismatch for payment {}", payment.id);
            return Err(CheckoutError::VerificationFailed(
                "provider signature does not match".to_string(),
            ));
        }

        Ok(ReportedStatus::Completed)
    }

    fn provider_name(&self) -> &str {
        SIGNED_PROVIDER
    }

    fn verifies_signatures(&self) -> bool {
        true
    }
}
