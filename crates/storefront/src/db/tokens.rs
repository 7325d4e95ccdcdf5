//! Postgres-backed download token store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use inkstand_core::{DownloadTokenId, ProductId};

use crate::payments::store::{StoreError, TokenRecord, TokenStore};

/// [`TokenStore`] over the `download_tokens` table.
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_token(row: &PgRow) -> Result<TokenRecord, StoreError> {
    Ok(TokenRecord {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn latest_active_for_product(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, product_id, expires_at, created_at FROM download_tokens \
             WHERE product_id = $1 AND expires_at > $2 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(product_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_token).transpose()
    }

    async fn insert(&self, token: &TokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO download_tokens (id, product_id, expires_at, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(token.id)
        .bind(token.product_id)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: DownloadTokenId) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, product_id, expires_at, created_at FROM download_tokens WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_token).transpose()
    }
}
