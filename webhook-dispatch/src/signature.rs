//! Webhook payload signature validation: GitHub signs the
//! raw request body with HMAC-SHA256 over the configured webhook secret
//! and sends the hex digest in `X-Hub-Signature-256: sha256=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `header_value` (the raw `X-Hub-Signature-256` header) against
/// `body` under `secret`. Returns `false` for a missing `sha256=` prefix,
/// non-hex digest, or a mismatch — never panics on attacker-controlled
/// input.
pub fn verify(secret: &[u8], body: &[u8], header_value: &str) -> bool {
    let Some(hex_digest) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    // `verify_slice` is constant-time.
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_a_correctly_signed_body() {
        let secret = b"topsecret";
        let body = b"{\"ref\":\"refs/heads/main\"}";
        let header = sign(secret, body);
        assert!(verify(secret, body, &header));
    }

    #[test]
    fn rejects_a_tampered_body() {
        let secret = b"topsecret";
        let header = sign(secret, b"original body");
        assert!(!verify(secret, b"tampered body", &header));
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(!verify(b"s", b"body", "not-a-signature"));
    }

    #[test]
    fn rejects_non_hex_digest() {
        assert!(!verify(b"s", b"body", "sha256=zzzz"));
    }
}
