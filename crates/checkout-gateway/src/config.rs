//! # Gateway Configuration
//!
//! Configuration for the payment providers.
//! Secrets are loaded from environment variables.

use checkout_core::CheckoutError;
use std::env;

pub const DEFAULT_REDIRECT_BASE: &str = "https://example.invalid/pay";
pub const DEFAULT_PROVIDER: &str = "upi";

/// Payment provider configuration
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL of the advisory `nextAction` link
    pub redirect_base: String,

    /// Provider used when a request names none
    pub default_provider: String,

    /// Razorpay key secret; enables the signature-verified provider when set
    pub razorpay_key_secret: Option<String>,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `PAYMENT_REDIRECT_BASE`
    /// - `DEFAULT_PAYMENT_PROVIDER`
    /// - `RAZORPAY_KEY_SECRET`
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CheckoutError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let redirect_base = lookup("PAYMENT_REDIRECT_BASE")
            .unwrap_or_else(|| DEFAULT_REDIRECT_BASE.to_string());
        if !redirect_base.starts_with("https://") && !redirect_base.starts_with("http://") {
            return Err(CheckoutError::Configuration(
                "PAYMENT_REDIRECT_BASE must be an http(s) URL".to_string(),
            ));
        }

        let default_provider = lookup("DEFAULT_PAYMENT_PROVIDER")
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());

        let razorpay_key_secret = lookup("RAZORPAY_KEY_SECRET").filter(|s| !s.is_empty());

        Ok(Self {
            redirect_base: redirect_base.trim_end_matches('/').to_string(),
            default_provider,
            razorpay_key_secret,
        })
    }

    /// Builder: set the signature secret
    pub fn with_razorpay_secret(mut self, secret: impl Into<String>) -> Self {
        self.razorpay_key_secret = Some(secret.into());
        self
    }

    /// Builder: set the default provider
    pub fn with_default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = provider.into();
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            redirect_base: DEFAULT_REDIRECT_BASE.to_string(),
            default_provider: DEFAULT_PROVIDER.to_string(),
            razorpay_key_secret: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("redirect_base", &self.redirect_base)
            .field("default_provider", &self.default_provider)
            .field(
                "razorpay_key_secret",
                &self.razorpay_key_secret.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.redirect_base, DEFAULT_REDIRECT_BASE);
        assert_eq!(config.default_provider, "upi");
        assert!(config.razorpay_key_secret.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("PAYMENT_REDIRECT_BASE", "https://pay.trozzy.in/go/"),
            ("DEFAULT_PAYMENT_PROVIDER", "PhonePe"),
            ("RAZORPAY_KEY_SECRET", "rzp_secret"),
        ]))
        .unwrap();
        assert_eq!(config.redirect_base, "https://pay.trozzy.in/go");
        assert_eq!(config.default_provider, "phonepe");
        assert_eq!(config.razorpay_key_secret.as_deref(), Some("rzp_secret"));
    }

    #[test]
    fn test_rejects_bad_redirect_base() {
        let result = GatewayConfig::from_lookup(lookup(&[("PAYMENT_REDIRECT_BASE", "ftp://x")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = GatewayConfig::default().with_razorpay_secret("rzp_secret");
        assert!(!format!("{:?}", config).contains("rzp_secret"));
    }
}
