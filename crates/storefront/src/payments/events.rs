//! Webhook event envelope.
//!
//! The gateway posts a signed JSON envelope with an event type discriminator
//! and a payment entity. Only `payment.captured` and `payment.failed` drive
//! the ledger; every other type is acknowledged and ignored. Deserialization
//! happens strictly after the raw body has passed signature verification.

use std::collections::HashMap;

use serde::Deserialize;

use inkstand_core::{GatewayIdError, GatewayOrderId, GatewayPaymentId, PaymentOutcome};

/// Event type that settles an order successfully.
pub const EVENT_PAYMENT_CAPTURED: &str = "payment.captured";
/// Event type that settles an order as failed.
pub const EVENT_PAYMENT_FAILED: &str = "payment.failed";

/// The outer envelope of a webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    /// Event type discriminator, e.g. `payment.captured`.
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<PaymentWrapper>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentWrapper {
    pub entity: PaymentEntity,
}

/// The payment entity carried by payment events.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    /// Gateway payment id.
    pub id: String,
    /// Gateway order id; the join key to the local order.
    pub order_id: String,
    /// Amount in minor units as reported by the gateway.
    pub amount: i64,
    /// Purchaser contact address, when the gateway captured one.
    #[serde(default)]
    pub email: Option<String>,
    /// Opaque metadata echoed back from order creation (carries the internal
    /// product id).
    #[serde(default)]
    pub notes: Option<HashMap<String, String>>,
}

impl WebhookEnvelope {
    /// The ledger outcome this event maps to, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        match self.event.as_str() {
            EVENT_PAYMENT_CAPTURED => Some(PaymentOutcome::Success),
            EVENT_PAYMENT_FAILED => Some(PaymentOutcome::Failure),
            _ => None,
        }
    }

    /// The payment entity, required for events that drive the ledger.
    #[must_use]
    pub fn payment(&self) -> Option<&PaymentEntity> {
        self.payload.payment.as_ref().map(|p| &p.entity)
    }
}

impl PaymentEntity {
    /// Parse the gateway order id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayIdError`] if the field is empty.
    pub fn gateway_order_id(&self) -> Result<GatewayOrderId, GatewayIdError> {
        GatewayOrderId::parse(&self.order_id)
    }

    /// Parse the gateway payment id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayIdError`] if the field is empty.
    pub fn gateway_payment_id(&self) -> Result<GatewayPaymentId, GatewayIdError> {
        GatewayPaymentId::parse(&self.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CAPTURED: &str = r#"{
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_29QQoUBi66xm2f",
                    "order_id": "order_9A33XWu170gUtm",
                    "amount": 50000,
                    "email": "buyer@example.com",
                    "notes": {"product_id": "b5f9f3a0-0000-4000-8000-000000000001"}
                }
            }
        }
    }"#;

    #[test]
    fn test_parses_captured_event() {
        let envelope: WebhookEnvelope = serde_json::from_str(CAPTURED).unwrap();
        assert_eq!(envelope.outcome(), Some(PaymentOutcome::Success));

        let payment = envelope.payment().unwrap();
        assert_eq!(payment.amount, 50_000);
        assert_eq!(
            payment.gateway_order_id().unwrap().as_str(),
            "order_9A33XWu170gUtm"
        );
        assert_eq!(
            payment.gateway_payment_id().unwrap().as_str(),
            "pay_29QQoUBi66xm2f"
        );
    }

    #[test]
    fn test_failed_event_maps_to_failure() {
        let envelope: WebhookEnvelope =
            serde_json::from_str(r#"{"event": "payment.failed", "payload": {}}"#).unwrap();
        assert_eq!(envelope.outcome(), Some(PaymentOutcome::Failure));
        assert!(envelope.payment().is_none());
    }

    #[test]
    fn test_other_events_have_no_outcome() {
        for event in ["payment.authorized", "refund.processed", "order.paid"] {
            let raw = format!(r#"{{"event": "{event}", "payload": {{}}}}"#);
            let envelope: WebhookEnvelope = serde_json::from_str(&raw).unwrap();
            assert_eq!(envelope.outcome(), None);
        }
    }

    #[test]
    fn test_missing_payload_tolerated() {
        let envelope: WebhookEnvelope =
            serde_json::from_str(r#"{"event": "ping"}"#).unwrap();
        assert!(envelope.payment().is_none());
    }
}
