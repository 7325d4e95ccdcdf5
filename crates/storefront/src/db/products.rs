//! Postgres-backed product catalog view.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use inkstand_core::ProductId;

use crate::payments::store::{ProductCatalog, ProductRecord, StoreError};

/// [`ProductCatalog`] over the `products` table.
#[derive(Clone)]
pub struct PgProductCatalog {
    pool: PgPool,
}

impl PgProductCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn find(&self, id: ProductId) -> Result<Option<ProductRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, price_minor, file_path FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(ProductRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                price: row.try_get("price_minor")?,
                file_path: row.try_get("file_path")?,
            })
        })
        .transpose()
    }
}
