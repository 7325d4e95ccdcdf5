//! Postgres-backed purchaser store.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use inkstand_core::{Email, PurchaserId};

use crate::payments::store::{PurchaserStore, StoreError};

/// [`PurchaserStore`] over the `purchasers` table.
#[derive(Clone)]
pub struct PgPurchaserStore {
    pool: PgPool,
}

impl PgPurchaserStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurchaserStore for PgPurchaserStore {
    async fn upsert(&self, email: &Email) -> Result<PurchaserId, StoreError> {
        // The DO UPDATE no-op makes RETURNING yield the row on conflict too.
        let row = sqlx::query(
            "INSERT INTO purchasers (id, email) VALUES ($1, $2) \
             ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email \
             RETURNING id",
        )
        .bind(PurchaserId::generate())
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    async fn email_of(&self, id: PurchaserId) -> Result<Option<Email>, StoreError> {
        let row = sqlx::query("SELECT email FROM purchasers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let raw: String = row.try_get("email")?;
            Email::parse(&raw).map_err(|e| StoreError::DataCorruption(e.to_string()))
        })
        .transpose()
    }
}
