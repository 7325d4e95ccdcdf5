//! Download token issuance.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use inkstand_core::{DownloadTokenId, ProductId};

use super::error::PaymentError;
use super::store::{TokenRecord, TokenStore};

/// Validity window for a freshly minted token.
const TOKEN_TTL_HOURS: i64 = 24;

/// A token handed to the purchaser, with its absolute expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedToken {
    pub id: DownloadTokenId,
    pub expires_at: DateTime<Utc>,
}

impl From<&TokenRecord> for IssuedToken {
    fn from(record: &TokenRecord) -> Self {
        Self {
            id: record.id,
            expires_at: record.expires_at,
        }
    }
}

/// Mints and reuses time-limited download capability tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    tokens: Arc<dyn TokenStore>,
}

impl TokenIssuer {
    /// Create an issuer backed by the given token store.
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        Self { tokens }
    }

    /// Return the newest non-expired token for the product, or mint a fresh
    /// one valid for 24 hours.
    ///
    /// Reuse keeps repeat "resend my link" requests from proliferating live
    /// tokens. The read-then-create is deliberately unguarded: two truly
    /// concurrent calls may each mint a token, and both are valid. Uniqueness
    /// of "the" token is a best-effort optimization, not an invariant.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Store`] if the token store fails.
    pub async fn issue_or_reuse(&self, product_id: ProductId) -> Result<IssuedToken, PaymentError> {
        let now = Utc::now();

        if let Some(existing) = self.tokens.latest_active_for_product(product_id, now).await? {
            tracing::debug!(token_id = %existing.id, product_id = %product_id, "reusing active download token");
            return Ok(IssuedToken::from(&existing));
        }

        let record = TokenRecord {
            id: DownloadTokenId::generate(),
            product_id,
            expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
            created_at: now,
        };
        self.tokens.insert(&record).await?;
        tracing::info!(token_id = %record.id, product_id = %product_id, expires_at = %record.expires_at, "minted download token");

        Ok(IssuedToken::from(&record))
    }
}
