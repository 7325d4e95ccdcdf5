//! Checkout: record purchase intent and open the gateway-side order.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use inkstand_core::{Email, OrderId, ProductId};

use crate::error::AppError;
use crate::gateway::{OpenOrderRequest, OrderNotes};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub product_id: ProductId,
    pub email: String,
}

/// Everything the payment widget needs to collect the payment.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    /// Amount in minor units, echoed from the catalog price.
    pub amount: i64,
    pub currency: String,
    /// Public gateway key id for the client-side widget.
    pub key_id: String,
}

/// POST /api/checkout
///
/// Creates a `Pending` order at the catalog price, opens the matching
/// gateway-side order, and binds its id. The client never supplies the
/// amount.
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let email =
        Email::parse(&request.email).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let order = state.ledger().create_order(&email, request.product_id).await?;

    let opened = state
        .gateway()
        .open_order(OpenOrderRequest {
            amount: order.amount,
            currency: state.currency().to_owned(),
            receipt: order.id.to_string(),
            notes: OrderNotes {
                order_id: order.id,
                product_id: order.product_id,
            },
        })
        .await?;

    state
        .ledger()
        .attach_gateway_reference(order.id, &opened.id)
        .await?;

    Ok(Json(CheckoutResponse {
        order_id: order.id,
        gateway_order_id: opened.id.to_string(),
        amount: order.amount.minor_units(),
        currency: state.currency().to_owned(),
        key_id: state.payments_key_id().to_owned(),
    }))
}
