//! HMAC-SHA256 helpers shared by signed gateways and access tokens.

use crate::error::{CheckoutError, CheckoutResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `message` under `secret`
pub fn compute_hmac_sha256(secret: &[u8], message: &[u8]) -> CheckoutResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| CheckoutError::Configuration(format!("invalid HMAC key: {}", e)))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compare two strings without short-circuiting on the first differing byte
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha256() {
        let sig = compute_hmac_sha256(b"rzp_test_secret", b"order_1|pay_1").unwrap();

        // Should produce a 64-character hex string
        assert_eq!(sig.len(), 64);
        assert_eq!(
            sig,
            compute_hmac_sha256(b"rzp_test_secret", b"order_1|pay_1").unwrap()
        );
        assert_ne!(
            sig,
            compute_hmac_sha256(b"other_secret", b"order_1|pay_1").unwrap()
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
