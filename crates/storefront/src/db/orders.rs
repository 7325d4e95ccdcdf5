//! Postgres-backed order ledger rows.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use inkstand_core::{
    Amount, GatewayOrderId, GatewayPaymentId, OrderId, OrderStatus, ProductId, PurchaserId,
};

use crate::payments::store::{BindOutcome, OrderRecord, OrderStore, StoreError};

const ORDER_COLUMNS: &str = "id, purchaser_id, product_id, amount_minor, status, \
     gateway_order_id, gateway_payment_id, created_at";

/// [`OrderStore`] over the `orders` table.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_order(row: &PgRow) -> Result<OrderRecord, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::DataCorruption(e.to_string()))?;

    let gateway_order_id: Option<String> = row.try_get("gateway_order_id")?;
    let gateway_order_id = gateway_order_id
        .as_deref()
        .map(GatewayOrderId::parse)
        .transpose()
        .map_err(|e| StoreError::DataCorruption(e.to_string()))?;

    let gateway_payment_id: Option<String> = row.try_get("gateway_payment_id")?;
    let gateway_payment_id = gateway_payment_id
        .as_deref()
        .map(GatewayPaymentId::parse)
        .transpose()
        .map_err(|e| StoreError::DataCorruption(e.to_string()))?;

    Ok(OrderRecord {
        id: row.try_get("id")?,
        purchaser_id: row.try_get("purchaser_id")?,
        product_id: row.try_get("product_id")?,
        amount: row.try_get("amount_minor")?,
        status,
        gateway_order_id,
        gateway_payment_id,
        created_at: row.try_get("created_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(
        &self,
        purchaser_id: PurchaserId,
        product_id: ProductId,
        amount: Amount,
    ) -> Result<OrderRecord, StoreError> {
        let id = OrderId::generate();
        let row = sqlx::query(&format!(
            "INSERT INTO orders (id, purchaser_id, product_id, amount_minor, status) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(purchaser_id)
        .bind(product_id)
        .bind(amount.minor_units())
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        map_order(&row)
    }

    async fn bind_gateway_order(
        &self,
        order_id: OrderId,
        gateway_order_id: &GatewayOrderId,
    ) -> Result<BindOutcome, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET gateway_order_id = $2 \
             WHERE id = $1 AND (gateway_order_id IS NULL OR gateway_order_id = $2)",
        )
        .bind(order_id)
        .bind(gateway_order_id.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(BindOutcome::Bound),
            Ok(_) => {
                // No row matched: either the order is absent or it carries a
                // different reference already.
                let row = sqlx::query("SELECT gateway_order_id FROM orders WHERE id = $1")
                    .bind(order_id)
                    .fetch_optional(&self.pool)
                    .await?;
                match row {
                    None => Ok(BindOutcome::OrderMissing),
                    Some(row) => {
                        let existing: Option<String> = row.try_get("gateway_order_id")?;
                        let existing = existing.ok_or_else(|| {
                            StoreError::DataCorruption(format!(
                                "order {order_id} unbound yet bind update matched nothing"
                            ))
                        })?;
                        let existing = GatewayOrderId::parse(&existing)
                            .map_err(|e| StoreError::DataCorruption(e.to_string()))?;
                        Ok(BindOutcome::AlreadyBound(existing))
                    }
                }
            }
            // Unique index on gateway_order_id: some other order holds it.
            Err(err) if is_unique_violation(&err) => Ok(BindOutcome::TakenByAnotherOrder),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_gateway_order(
        &self,
        gateway_order_id: &GatewayOrderId,
    ) -> Result<Option<OrderRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE gateway_order_id = $1"
        ))
        .bind(gateway_order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_order).transpose()
    }

    async fn settle_if_pending(
        &self,
        gateway_order_id: &GatewayOrderId,
        status: OrderStatus,
        gateway_payment_id: Option<&GatewayPaymentId>,
    ) -> Result<Option<OrderRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE orders \
             SET status = $2, gateway_payment_id = COALESCE($3, gateway_payment_id) \
             WHERE gateway_order_id = $1 AND status = 'pending' \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(gateway_order_id.as_str())
        .bind(status.as_str())
        .bind(gateway_payment_id.map(GatewayPaymentId::as_str))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_order).transpose()
    }

    async fn any_completed_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS( \
                SELECT 1 FROM orders WHERE product_id = $1 AND status = 'completed' \
             ) AS found",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("found")?)
    }
}
