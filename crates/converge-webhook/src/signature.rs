//! HMAC-SHA256 signature verification/signing shared by inbound GitHub
//! webhooks (`X-Hub-Signature-256`) and outbound notifications
//! (`X-Converge-Signature`). Both use the same `sha256=<hex>` envelope.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Produces the `sha256=<hex>` header value for `body` signed with `secret`.
pub fn sign_header(secret: &str, body: &[u8]) -> String {
    format!("sha256={}", sign(secret, body))
}

/// Verifies a `sha256=<hex>` signature header against `body`, in constant
/// time over the digest comparison.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(provided_hex) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(provided) = hex::decode(provided_hex) else {
        return false;
    };
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_sign_and_verify() {
        let header = sign_header("secret", b"hello");
        assert!(verify_signature("secret", b"hello", &header));
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = sign_header("secret", b"hello");
        assert!(!verify_signature("wrong", b"hello", &header));
    }

    #[test]
    fn rejects_tampered_body() {
        let header = sign_header("secret", b"hello");
        assert!(!verify_signature("secret", b"goodbye", &header));
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(!verify_signature("secret", b"hello", "not-a-signature"));
    }
}
