//! HTTP route handlers for the payment and download surface.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness check
//! GET  /health/ready                - Readiness check (database ping)
//!
//! # Checkout
//! POST /api/checkout                - Record purchase intent, open gateway order
//! POST /api/payments/verify         - Client-submitted payment confirmation
//! GET  /api/orders/{gateway_order_id} - Order summary for the success page
//!
//! # Gateway callbacks
//! POST /webhooks/payments           - Signed gateway webhook deliveries
//!
//! # Downloads
//! GET  /downloads/{token_id}        - Serve the purchased file
//! GET  /downloads/expired           - Uniform "link expired" page
//! ```

pub mod checkout;
pub mod downloads;
pub mod payments;
pub mod webhooks;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/api/checkout", post(checkout::create))
        .route("/api/payments/verify", post(payments::verify))
        .route("/api/orders/{gateway_order_id}", get(payments::summary))
        .route("/webhooks/payments", post(webhooks::receive))
        .route("/downloads/expired", get(downloads::expired))
        .route("/downloads/{token_id}", get(downloads::fetch))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK. Test assemblies run
/// without a pool and are always ready.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
