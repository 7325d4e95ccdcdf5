//! Gateway webhook receiver.
//!
//! Response policy drives the gateway's retry behavior:
//!
//! - 401: signature failure; the delivery is not from the gateway
//! - 200: processed, duplicate, irrelevant event type, or a contradictory
//!   outcome (retrying a contradiction can never succeed, so it is
//!   acknowledged and escalated through logs instead)
//! - 404: no matching order yet; the gateway should retry later

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::json;

use crate::error::AppError;
use crate::payments::PaymentError;
use crate::payments::events::WebhookEnvelope;
use crate::state::AppState;

/// Header carrying the hex HMAC of the raw request body.
const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// POST /webhooks/payments
///
/// Verification runs against the raw body bytes exactly as received; the
/// JSON is only parsed once the signature has checked out.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !state.verifier().verify_webhook(&body, signature) {
        tracing::warn!("webhook signature verification failed");
        return Err(AppError::Unauthorized(
            "webhook signature verification failed".to_string(),
        ));
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed webhook body: {e}")))?;

    let Some(outcome) = envelope.outcome() else {
        tracing::debug!(event = %envelope.event, "ignoring webhook event type");
        return Ok(Json(json!({ "status": "ignored" })));
    };

    let payment = envelope.payment().ok_or_else(|| {
        AppError::BadRequest(format!("event {} carries no payment entity", envelope.event))
    })?;
    let gateway_order_id = payment
        .gateway_order_id()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let gateway_payment_id = payment
        .gateway_payment_id()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    match state
        .ledger()
        .apply_outcome(&gateway_order_id, outcome, Some(&gateway_payment_id))
        .await
    {
        Ok(settled) => {
            if settled.order.amount.minor_units() != payment.amount {
                tracing::warn!(
                    order_id = %settled.order.id,
                    expected = settled.order.amount.minor_units(),
                    reported = payment.amount,
                    "webhook amount differs from order amount"
                );
            }
            Ok(Json(json!({ "status": "ok" })))
        }
        // Acknowledged, never retried: the contradiction is already logged
        // for manual review by the ledger.
        Err(PaymentError::Conflict(_)) => Ok(Json(json!({ "status": "conflict" }))),
        Err(err) => Err(err.into()),
    }
}
