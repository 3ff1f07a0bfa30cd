//! # Bearer Tokens
//!
//! Stand-in for the identity service. Tokens look like
//!
//! ```text
//! v1.<hex(json claims)>.<hex(hmac-sha256(secret, "v1.<hex(json claims)>"))>
//! ```
//!
//! with claims `{sub, role, exp}`. The secret has no default: startup fails without it.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use checkout_core::signature::{compute_hmac_sha256, constant_time_compare};
use checkout_core::{CheckoutError, CheckoutResult};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TOKEN_VERSION: &str = "v1";

/// Minimum secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

/// Why a token was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("missing bearer token")]
    Missing,

    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,
}

impl From<TokenError> for CheckoutError {
    fn from(err: TokenError) -> Self {
        CheckoutError::Unauthorized(err.to_string())
    }
}

/// Issues and verifies bearer tokens
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> CheckoutResult<Self> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LEN {
            return Err(CheckoutError::Configuration(format!(
                "AUTH_TOKEN_SECRET must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    /// Sign a token for `user_id` valid for `ttl`
    pub fn issue(&self, user_id: &str, role: Role, ttl: Duration) -> CheckoutResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: (Utc::now() + ttl).timestamp(),
        };
        let json = serde_json::to_vec(&claims)
            .map_err(|e| CheckoutError::Internal(format!("encode claims: {}", e)))?;
        let signed = format!("{}.{}", TOKEN_VERSION, hex::encode(json));
        let signature = compute_hmac_sha256(&self.secret, signed.as_bytes())?;
        Ok(format!("{}.{}", signed, signature))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let (signed, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (version, payload) = signed.split_once('.').ok_or(TokenError::Malformed)?;
        if version != TOKEN_VERSION {
            return Err(TokenError::Malformed);
        }

        let expected = compute_hmac_sha256(&self.secret, signed.as_bytes())
            .map_err(|_| TokenError::BadSignature)?;
        if !constant_time_compare(signature, &expected) {
            return Err(TokenError::BadSignature);
        }

        let json = hex::decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::Missing)
            .map_err(CheckoutError::from)?;

        let claims = state.tokens.verify(token).map_err(CheckoutError::from)?;
        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}

/// Authenticated caller with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(CheckoutError::Forbidden("admin role required".to_string()).into());
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_issue_and_verify() {
        let signer = TokenSigner::new(SECRET).unwrap();
        let token = signer.issue("u1", Role::Admin, Duration::hours(1)).unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_short_secret_is_rejected() {
        assert!(TokenSigner::new("changeme").is_err());
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let signer = TokenSigner::new(SECRET).unwrap();
        let token = signer.issue("u1", Role::User, Duration::hours(1)).unwrap();

        // Swap the claims for an admin claim signed by nobody
        let forged_claims = hex::encode(br#"{"sub":"u1","role":"admin","exp":9999999999}"#);
        let signature = token.rsplit_once('.').unwrap().1;
        let forged = format!("v1.{}.{}", forged_claims, signature);
        assert_eq!(signer.verify(&forged), Err(TokenError::BadSignature));

        let other = TokenSigner::new("ffffffffffffffffffffffffffffffff").unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
        assert_eq!(signer.verify("garbage"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let signer = TokenSigner::new(SECRET).unwrap();
        let token = signer.issue("u1", Role::User, Duration::seconds(-5)).unwrap();
        assert_eq!(signer.verify(&token), Err(TokenError::Expired));
    }
}
