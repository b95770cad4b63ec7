//! Authenticity verification for payment confirmations and webhook bodies.
//!
//! Both checks recompute an HMAC-SHA256 with a shared secret and compare in
//! constant time. Webhook verification must run over the exact raw request
//! body as received; re-serializing parsed JSON is not equivalent.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{LedgerError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Verifies provider signatures for payment confirmations and webhooks.
///
/// Pure verification; no side effects. Fails closed: a missing secret is a
/// configuration error, never a pass.
#[derive(Clone, Default)]
pub struct SignatureVerifier {
    key_secret: Option<String>,
    webhook_secret: Option<String>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("key_secret", &self.key_secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl SignatureVerifier {
    /// Creates a verifier with the given secrets. Either may be absent when
    /// the provider is not configured; the corresponding checks then fail
    /// closed.
    #[must_use]
    pub fn new(key_secret: Option<String>, webhook_secret: Option<String>) -> Self {
        Self {
            key_secret: normalize(key_secret),
            webhook_secret: normalize(webhook_secret),
        }
    }

    /// Returns true if the payment-confirmation secret is configured.
    #[must_use]
    pub fn payment_secret_configured(&self) -> bool {
        self.key_secret.is_some()
    }

    /// Verifies the signature a payer submits after checkout.
    ///
    /// The signed message is `"{order_ref}|{payment_ref}"`; the supplied
    /// signature is lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the provider key secret is
    /// not configured.
    pub fn verify_payment(
        &self,
        order_ref: &str,
        payment_ref: &str,
        signature: &str,
    ) -> Result<bool> {
        let secret = self.key_secret.as_deref().ok_or_else(|| {
            LedgerError::configuration("provider key secret is not configured")
        })?;

        let message = format!("{order_ref}|{payment_ref}");
        Ok(verify_hex_hmac(secret.as_bytes(), message.as_bytes(), signature))
    }

    /// Verifies a webhook signature over the exact raw request body.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the webhook secret is not
    /// configured.
    pub fn verify_webhook(&self, raw_body: &[u8], signature: &str) -> Result<bool> {
        let secret = self.webhook_secret.as_deref().ok_or_else(|| {
            LedgerError::configuration("provider webhook secret is not configured")
        })?;

        Ok(verify_hex_hmac(secret.as_bytes(), raw_body, signature))
    }
}

/// Computes the hex HMAC-SHA256 of a message. Exposed for tests and tooling
/// that need to produce valid signatures.
#[must_use]
pub fn sign_hex(secret: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC-SHA256 accepts any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_hex_hmac(secret: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Ok(supplied) = hex::decode(signature_hex) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC-SHA256 accepts any key length");
    mac.update(message);
    // verify_slice is the constant-time comparison.
    mac.verify_slice(&supplied).is_ok()
}

fn normalize(secret: Option<String>) -> Option<String> {
    secret
        .map(|s| s.trim().trim_matches(['\'', '"']).to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(Some("key-secret".into()), Some("hook-secret".into()))
    }

    #[test]
    fn valid_payment_signature_verifies() {
        let sig = sign_hex(b"key-secret", b"order_1|pay_1");
        assert!(verifier().verify_payment("order_1", "pay_1", &sig).unwrap());
    }

    #[test]
    fn mutated_inputs_fail_verification() {
        let sig = sign_hex(b"key-secret", b"order_1|pay_1");
        let v = verifier();

        assert!(!v.verify_payment("order_2", "pay_1", &sig).unwrap());
        assert!(!v.verify_payment("order_1", "pay_2", &sig).unwrap());

        // Flip one hex digit of the signature.
        let mut bad = sig.clone().into_bytes();
        bad[0] = if bad[0] == b'0' { b'1' } else { b'0' };
        let bad = String::from_utf8(bad).unwrap();
        assert!(!v.verify_payment("order_1", "pay_1", &bad).unwrap());
    }

    #[test]
    fn non_hex_signature_is_rejected_not_an_error() {
        assert!(!verifier()
            .verify_payment("order_1", "pay_1", "not-hex!")
            .unwrap());
    }

    #[test]
    fn missing_secret_fails_closed() {
        let v = SignatureVerifier::new(None, None);
        let err = v.verify_payment("o", "p", "00").unwrap_err();
        assert!(matches!(err, LedgerError::Configuration { .. }));

        let err = v.verify_webhook(b"{}", "00").unwrap_err();
        assert!(matches!(err, LedgerError::Configuration { .. }));
    }

    #[test]
    fn webhook_signature_covers_raw_bytes() {
        let body = br#"{"event":"payment.captured","payload":{}}"#;
        let sig = sign_hex(b"hook-secret", body);
        let v = verifier();

        assert!(v.verify_webhook(body, &sig).unwrap());

        // Whitespace-different but JSON-equivalent body must not verify.
        let reserialized = br#"{"event": "payment.captured", "payload": {}}"#;
        assert!(!v.verify_webhook(reserialized, &sig).unwrap());
    }

    #[test]
    fn secrets_are_trimmed_of_quotes_and_whitespace() {
        let v = SignatureVerifier::new(Some(" \"key-secret\"\n".into()), None);
        let sig = sign_hex(b"key-secret", b"o|p");
        assert!(v.verify_payment("o", "p", &sig).unwrap());
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", verifier());
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("key-secret"));
    }
}
