//! # checkout-gateway
//!
//! Payment provider implementations for the storefront checkout.
//!
//! This crate provides two kinds of [`PaymentGateway`]:
//!
//! 1. **MockGateway** - `upi`, `phonepe`, `paytm`
//!    - Locally generated provider reference
//!    - Accepts whatever outcome the client reports
//!    - Best for: development, tests, the mocked checkout flow
//!
//! 2. **SignedGateway** - `razorpay`
//!    - HMAC signature over `providerOrderId|providerPaymentId`
//!    - Refuses `completed` unless the signature matches
//!    - Enabled by setting `RAZORPAY_KEY_SECRET`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_gateway::{default_selector, GatewayConfig};
//!
//! let gateways = default_selector(&GatewayConfig::from_env()?)?;
//! let ledger = PaymentLedger::new(payments, materializer, gateways);
//! ```

pub mod config;
pub mod mock;
pub mod signed;

use checkout_core::{CheckoutError, CheckoutResult, GatewaySelector, PaymentGateway};
use std::sync::Arc;
use tracing::{info, warn};

// Re-exports
pub use config::GatewayConfig;
pub use mock::{MockGateway, MOCK_PROVIDERS};
pub use signed::{SignedGateway, SIGNED_PROVIDER};

/// Register every provider the configuration enables
pub fn default_selector(config: &GatewayConfig) -> CheckoutResult<GatewaySelector> {
    let mut selector = GatewaySelector::new(config.default_provider.clone());
    for provider in MOCK_PROVIDERS {
        selector.register(Arc::new(MockGateway::new(provider, config.redirect_base.clone())));
    }
    if let Some(secret) = &config.razorpay_key_secret {
        selector.register(Arc::new(SignedGateway::new(
            secret.clone(),
            config.redirect_base.clone(),
        )));
    }

    if !selector.has_provider(&config.default_provider) {
        return Err(CheckoutError::Configuration(format!(
            "DEFAULT_PAYMENT_PROVIDER {:?} is not one of: {}",
            config.default_provider,
            selector.providers().join(", ")
        )));
    }

    info!("Payment providers: {}", selector.providers().join(", "));
    if !has_verified_provider(&selector) {
        warn!("No provider checks signatures; client-reported payment outcomes are trusted");
    }
    Ok(selector)
}

/// Whether any registered provider checks signatures
pub fn has_verified_provider(selector: &GatewaySelector) -> bool {
    selector
        .providers()
        .into_iter()
        .filter_map(|p| selector.get(p))
        .any(|g| g.verifies_signatures())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selector() {
        let selector = default_selector(&GatewayConfig::default()).unwrap();
        assert_eq!(selector.providers(), vec!["paytm", "phonepe", "upi"]);
        assert_eq!(selector.default_provider(), "upi");
        assert!(!has_verified_provider(&selector));
    }

    #[test]
    fn test_signed_provider_is_opt_in() {
        let config = GatewayConfig::default().with_razorpay_secret("rzp_secret");
        let selector = default_selector(&config).unwrap();
        assert!(selector.has_provider(SIGNED_PROVIDER));
        assert!(has_verified_provider(&selector));
    }

    #[test]
    fn test_unknown_default_provider_fails() {
        let config = GatewayConfig::default().with_default_provider("razorpay");
        assert!(default_selector(&config).is_err());
    }
}
