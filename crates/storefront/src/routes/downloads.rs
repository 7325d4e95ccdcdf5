//! Download delivery.

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};

use inkstand_core::{DownloadTokenId, parse_opaque};

use crate::error::AppError;
use crate::payments::{Decision, DenyReason};
use crate::state::AppState;

const EXPIRED_PATH: &str = "/downloads/expired";

/// GET /downloads/{token_id}
///
/// Serves the purchased file for a valid token. Every denial, including a
/// token id that does not even parse, lands on the same "link expired" page;
/// the boundary never reveals which check failed.
pub async fn fetch(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Result<Response, AppError> {
    let Some(token_id) = parse_opaque(&token_id).map(DownloadTokenId::new) else {
        tracing::debug!("malformed download token in request path");
        return Ok(Redirect::to(EXPIRED_PATH).into_response());
    };

    match state.gate().authorize(token_id).await? {
        Decision::Granted(grant) => {
            let bytes = state.blobs().read(&grant.file_path).await?;
            tracing::info!(
                token_id = %token_id,
                filename = %grant.filename,
                bytes = grant.content_length,
                "serving download"
            );

            let headers = [
                (
                    header::CONTENT_TYPE,
                    "application/octet-stream".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", grant.filename),
                ),
                (header::CONTENT_LENGTH, grant.content_length.to_string()),
                (header::CACHE_CONTROL, "no-cache".to_string()),
            ];
            Ok((StatusCode::OK, headers, bytes).into_response())
        }
        Decision::Denied(reason) => {
            match reason {
                DenyReason::Expired => {
                    tracing::debug!(token_id = %token_id, "download denied: token expired");
                }
                DenyReason::Unauthorized => {
                    tracing::warn!(token_id = %token_id, "download denied: no completed order");
                }
                DenyReason::NotFound => {
                    tracing::warn!(token_id = %token_id, "download denied: product or file missing");
                }
            }
            Ok(Redirect::to(EXPIRED_PATH).into_response())
        }
    }
}

/// GET /downloads/expired
///
/// The uniform denial page.
pub async fn expired() -> Html<&'static str> {
    Html(
        "<!doctype html>\
         <html><head><title>Link expired</title></head>\
         <body><h1>This download link has expired</h1>\
         <p>Download links are valid for 24 hours after purchase. \
         Revisit your order confirmation page to get a fresh link.</p>\
         </body></html>",
    )
}
