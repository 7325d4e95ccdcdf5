//! Unified error handling for the storefront HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::payments::PaymentError;
use crate::payments::store::StoreError;

/// Application-level error type for HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Payment gateway operation failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Signature verification failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// State conflict (e.g. contradictory payment outcome).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(msg) => Self::BadRequest(msg),
            PaymentError::NotFound(msg) => Self::NotFound(msg),
            PaymentError::Conflict(msg) => Self::Conflict(msg),
            PaymentError::Store(err) => Self::Store(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Report server-side failures to Sentry
        if matches!(self, Self::Store(_) | Self::Internal(_) | Self::Gateway(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront request error"
            );
        }

        let status = match &self {
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Gateway(_) => "Payment provider error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}
