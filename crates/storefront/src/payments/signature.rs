//! Gateway signature verification.
//!
//! Both delivery paths carry an HMAC-SHA256 hex signature. The confirmation
//! path (client-submitted) signs `"{gateway_order_id}|{gateway_payment_id}"`
//! with the API key secret; the webhook path (server-to-server) signs the
//! raw request body with a separate webhook secret. Webhook verification
//! must happen on the exact bytes as received, before any JSON parsing.
//!
//! The two channels use distinct secrets, so a value signed for one channel
//! never verifies on the other.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use inkstand_core::{GatewayOrderId, GatewayPaymentId};

type HmacSha256 = Hmac<Sha256>;

/// Delimiter between order id and payment id in the confirmation payload.
const CONFIRMATION_DELIMITER: char = '|';

/// Verifies that inbound payment messages originated from the gateway.
///
/// Stateless; fails closed on any malformed input (empty signature, bad hex,
/// mismatch) rather than erroring.
#[derive(Clone)]
pub struct SignatureVerifier {
    confirmation_secret: SecretString,
    webhook_secret: SecretString,
}

impl SignatureVerifier {
    /// Create a verifier holding both channel secrets.
    #[must_use]
    pub const fn new(confirmation_secret: SecretString, webhook_secret: SecretString) -> Self {
        Self {
            confirmation_secret,
            webhook_secret,
        }
    }

    /// Verify a client-submitted payment confirmation.
    #[must_use]
    pub fn verify_confirmation(
        &self,
        order_id: &GatewayOrderId,
        payment_id: &GatewayPaymentId,
        provided_signature: &str,
    ) -> bool {
        let payload = format!(
            "{}{CONFIRMATION_DELIMITER}{}",
            order_id.as_str(),
            payment_id.as_str()
        );
        verify_hmac_hex(
            payload.as_bytes(),
            provided_signature,
            self.confirmation_secret.expose_secret(),
        )
    }

    /// Verify a webhook delivery against the raw body bytes.
    #[must_use]
    pub fn verify_webhook(&self, raw_body: &[u8], provided_signature: &str) -> bool {
        verify_hmac_hex(
            raw_body,
            provided_signature,
            self.webhook_secret.expose_secret(),
        )
    }
}

/// Compute HMAC-SHA256 over `payload` and compare with a hex signature in
/// constant time.
fn verify_hmac_hex(payload: &[u8], provided_signature: &str, secret: &str) -> bool {
    if provided_signature.is_empty() {
        return false;
    }

    let Ok(provided) = hex::decode(provided_signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    let computed = mac.finalize().into_bytes();

    // ct_eq on slices of different lengths is already false.
    computed.as_slice().ct_eq(&provided).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(
            SecretString::from("confirmation-secret"),
            SecretString::from("webhook-secret"),
        )
    }

    #[test]
    fn test_webhook_accepts_valid_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let signature = sign(body, "webhook-secret");
        assert!(verifier().verify_webhook(body, &signature));
    }

    #[test]
    fn test_webhook_rejects_tampered_last_byte() {
        let mut body = br#"{"event":"payment.captured"}"#.to_vec();
        let signature = sign(&body, "webhook-secret");
        *body.last_mut().unwrap() ^= 0x01;
        assert!(!verifier().verify_webhook(&body, &signature));
    }

    #[test]
    fn test_webhook_rejects_empty_signature() {
        assert!(!verifier().verify_webhook(b"body", ""));
    }

    #[test]
    fn test_webhook_rejects_wrong_secret() {
        let body = b"body";
        let signature = sign(body, "some-other-secret");
        assert!(!verifier().verify_webhook(body, &signature));
    }

    #[test]
    fn test_webhook_rejects_non_hex_signature() {
        assert!(!verifier().verify_webhook(b"body", "not hex at all"));
    }

    #[test]
    fn test_webhook_rejects_truncated_signature() {
        let body = b"body";
        let mut signature = sign(body, "webhook-secret");
        signature.truncate(16);
        assert!(!verifier().verify_webhook(body, &signature));
    }

    #[test]
    fn test_confirmation_accepts_valid_signature() {
        let order: GatewayOrderId = "order_abc".parse().unwrap();
        let payment: GatewayPaymentId = "pay_xyz".parse().unwrap();
        let signature = sign(b"order_abc|pay_xyz", "confirmation-secret");
        assert!(verifier().verify_confirmation(&order, &payment, &signature));
    }

    #[test]
    fn test_confirmation_rejects_swapped_ids() {
        let order: GatewayOrderId = "order_abc".parse().unwrap();
        let payment: GatewayPaymentId = "pay_xyz".parse().unwrap();
        let signature = sign(b"pay_xyz|order_abc", "confirmation-secret");
        assert!(!verifier().verify_confirmation(&order, &payment, &signature));
    }

    #[test]
    fn test_channels_do_not_cross_honor() {
        // A valid confirmation signature must not verify on the webhook
        // channel, and vice versa.
        let order: GatewayOrderId = "order_abc".parse().unwrap();
        let payment: GatewayPaymentId = "pay_xyz".parse().unwrap();

        let confirmation_sig = sign(b"order_abc|pay_xyz", "confirmation-secret");
        assert!(!verifier().verify_webhook(b"order_abc|pay_xyz", &confirmation_sig));

        let webhook_sig = sign(b"order_abc|pay_xyz", "webhook-secret");
        assert!(!verifier().verify_confirmation(&order, &payment, &webhook_sig));
    }
}
