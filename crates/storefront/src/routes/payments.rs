//! Client-facing payment endpoints: confirmation and the order summary.

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkstand_core::{
    DownloadTokenId, GatewayOrderId, GatewayPaymentId, OrderId, OrderStatus, PaymentOutcome,
};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub download: Option<DownloadInfo>,
}

#[derive(Debug, Serialize)]
pub struct DownloadInfo {
    pub token: DownloadTokenId,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/payments/verify
///
/// The synchronous confirmation path: the checkout widget hands back the
/// gateway order id, payment id, and a signature over the pair. A bad
/// signature is rejected with 401 before any state is touched; it proves
/// nothing about the payment itself, which the webhook path will still
/// settle independently.
pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    let gateway_order_id = GatewayOrderId::parse(&request.gateway_order_id)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let gateway_payment_id = GatewayPaymentId::parse(&request.gateway_payment_id)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if !state
        .verifier()
        .verify_confirmation(&gateway_order_id, &gateway_payment_id, &request.signature)
    {
        tracing::warn!(gateway_order_id = %gateway_order_id, "payment confirmation signature mismatch");
        return Err(AppError::Unauthorized(
            "payment signature verification failed".to_string(),
        ));
    }

    let settled = state
        .ledger()
        .apply_outcome(
            &gateway_order_id,
            PaymentOutcome::Success,
            Some(&gateway_payment_id),
        )
        .await?;

    Ok(Json(VerifyResponse {
        order_id: settled.order.id,
        status: settled.order.status,
        download: settled.token.map(|t| DownloadInfo {
            token: t.id,
            expires_at: t.expires_at,
        }),
    }))
}

#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub amount: i64,
    pub download: Option<DownloadInfo>,
}

/// GET /api/orders/{gateway_order_id}
///
/// Order summary for the post-payment success page. For a completed order
/// this surfaces a valid download token (reusing the newest live one), so a
/// purchaser revisiting the page after the original link expired gets a
/// fresh one. Never moves the order itself.
pub async fn summary(
    State(state): State<AppState>,
    Path(gateway_order_id): Path<String>,
) -> Result<Json<OrderSummary>, AppError> {
    let gateway_order_id = GatewayOrderId::parse(&gateway_order_id)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let order = state
        .ledger()
        .find_by_gateway_order(&gateway_order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {gateway_order_id} not found")))?;

    // Re-applying Success to an already-completed order only reuses or
    // re-mints a token; it cannot transition anything.
    let download = if order.status == OrderStatus::Completed {
        let settled = state
            .ledger()
            .apply_outcome(&gateway_order_id, PaymentOutcome::Success, None)
            .await?;
        settled.token.map(|t| DownloadInfo {
            token: t.id,
            expires_at: t.expires_at,
        })
    } else {
        None
    };

    Ok(Json(OrderSummary {
        order_id: order.id,
        status: order.status,
        amount: order.amount.minor_units(),
        download,
    }))
}
