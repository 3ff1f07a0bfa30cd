//! # Checkout Error Types
//!
//! Typed error handling for the checkout core.
//! All cart, payment and order operations return `Result<T, CheckoutError>`.

use thiserror::Error;

/// Core error type for all checkout operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Malformed or missing input (non-positive quantities, bad identifiers, ...)
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Cart, cart line, payment or order does not exist (or belongs to someone else)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Product exists but cannot be ordered right now
    #[error("Product not available: {product_id}")]
    Unavailable { product_id: String },

    /// Uniqueness or concurrency conflict that could not be resolved internally
    #[error("Conflict: {0}")]
    Conflict(String),

    /// State machine refused the requested status change
    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Missing or invalid credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Credential is valid but lacks the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Configuration errors (missing secrets, invalid values)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Payment provider refused the reported outcome (bad signature, unknown reference)
    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),

    /// Upstream collaborator returned an error
    #[error("Provider error [{provider}]: {message}")]
    Provider { provider: String, message: String },

    /// Network/HTTP error talking to a collaborator
    #[error("Network error: {0}")]
    Network(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckoutError {
    /// Shorthand for a field-level validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CheckoutError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a missing entity
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CheckoutError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns true if the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::Network(_) | CheckoutError::Provider { .. } | CheckoutError::Storage(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::Validation { .. } => 400,
            CheckoutError::NotFound { .. } => 404,
            CheckoutError::Unavailable { .. } => 404,
            CheckoutError::Conflict(_) => 409,
            CheckoutError::InvalidTransition { .. } => 409,
            CheckoutError::Unauthorized(_) => 401,
            CheckoutError::Forbidden(_) => 403,
            CheckoutError::Configuration(_) => 500,
            CheckoutError::VerificationFailed(_) => 400,
            CheckoutError::Provider { .. } => 502,
            CheckoutError::Network(_) => 503,
            CheckoutError::Storage(_) => 500,
            CheckoutError::Internal(_) => 500,
        }
    }

    /// Field name for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            CheckoutError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(CheckoutError::Network("timeout".into()).is_retryable());
        assert!(CheckoutError::Provider {
            provider: "catalog".into(),
            message: "502".into()
        }
        .is_retryable());
        assert!(!CheckoutError::validation("quantity", "must be positive").is_retryable());
        assert!(!CheckoutError::Conflict("order number".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CheckoutError::validation("productId", "bad").status_code(), 400);
        assert_eq!(CheckoutError::not_found("Payment", "p1").status_code(), 404);
        assert_eq!(
            CheckoutError::Unavailable {
                product_id: "prod-A".into()
            }
            .status_code(),
            404
        );
        assert_eq!(CheckoutError::Unauthorized("no token".into()).status_code(), 401);
        assert_eq!(
            CheckoutError::InvalidTransition {
                entity: "payment",
                from: "failed".into(),
                to: "completed".into()
            }
            .status_code(),
            409
        );
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = CheckoutError::validation("quantity", "must be a positive integer");
        assert_eq!(err.field(), Some("quantity"));
        assert_eq!(err.to_string(), "Invalid quantity: must be a positive integer");
    }
}
