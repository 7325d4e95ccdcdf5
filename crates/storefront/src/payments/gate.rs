//! Download authorization.
//!
//! The gate is the sole path by which a token yields file access. A token is
//! honored only while it is unexpired AND at least one completed order still
//! exists for its bound product; authorization is re-checked on every
//! request, so administratively removing a product's last completed order
//! immediately invalidates outstanding tokens.

use std::sync::Arc;

use chrono::Utc;

use inkstand_core::DownloadTokenId;

use super::error::PaymentError;
use super::store::{BlobStore, OrderStore, ProductCatalog, TokenStore};

/// Why a download was denied.
///
/// Reasons are logged server-side but presented uniformly to the end user as
/// "link expired" so the boundary leaks nothing about which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Token absent or past its expiry.
    Expired,
    /// No completed order exists for the bound product.
    Unauthorized,
    /// Product record or backing file is missing.
    NotFound,
}

/// Everything the HTTP layer needs to stream the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadGrant {
    /// Blob path of the deliverable.
    pub file_path: String,
    /// Sanitized filename for the Content-Disposition header.
    pub filename: String,
    /// Exact byte length of the file.
    pub content_length: u64,
    /// Human-readable product name.
    pub product_name: String,
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Granted(DownloadGrant),
    Denied(DenyReason),
}

/// Validates a presented token plus order state before releasing file bytes.
#[derive(Clone)]
pub struct DownloadGate {
    tokens: Arc<dyn TokenStore>,
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    blobs: Arc<dyn BlobStore>,
}

impl DownloadGate {
    /// Create a gate over the given collaborators.
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            tokens,
            orders,
            catalog,
            blobs,
        }
    }

    /// Check a presented token and resolve the file it grants access to.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Store`] only for backend failures; every
    /// authorization outcome (including an unknown token id) is a
    /// [`Decision`], never an error.
    pub async fn authorize(&self, token_id: DownloadTokenId) -> Result<Decision, PaymentError> {
        let now = Utc::now();

        let Some(token) = self.tokens.find(token_id).await? else {
            return Ok(Decision::Denied(DenyReason::Expired));
        };
        if !token.is_active_at(now) {
            tracing::debug!(token_id = %token_id, expires_at = %token.expires_at, "download token expired");
            return Ok(Decision::Denied(DenyReason::Expired));
        }

        if !self
            .orders
            .any_completed_for_product(token.product_id)
            .await?
        {
            tracing::warn!(token_id = %token_id, product_id = %token.product_id, "live token without a completed order");
            return Ok(Decision::Denied(DenyReason::Unauthorized));
        }

        let Some(product) = self.catalog.find(token.product_id).await? else {
            tracing::warn!(token_id = %token_id, product_id = %token.product_id, "token bound to missing product");
            return Ok(Decision::Denied(DenyReason::NotFound));
        };

        let Some(metadata) = self.blobs.metadata(&product.file_path).await? else {
            tracing::error!(product_id = %product.id, file_path = %product.file_path, "product file missing from blob store");
            return Ok(Decision::Denied(DenyReason::NotFound));
        };

        Ok(Decision::Granted(DownloadGrant {
            filename: download_filename(&product.name, &product.file_path),
            file_path: product.file_path,
            content_length: metadata.len,
            product_name: product.name,
        }))
    }
}

/// Build a download filename from the product name and the stored file's
/// extension, keeping only a conservative safe character set.
fn download_filename(product_name: &str, file_path: &str) -> String {
    let safe_name = sanitize(product_name);
    match extension_of(file_path) {
        Some(ext) => format!("{safe_name}.{ext}"),
        None => safe_name,
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with an underscore.
fn sanitize(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "download".to_owned()
    } else {
        sanitized
    }
}

fn extension_of(file_path: &str) -> Option<&str> {
    std::path::Path::new(file_path)
        .extension()
        .and_then(|ext| ext.to_str())
}
