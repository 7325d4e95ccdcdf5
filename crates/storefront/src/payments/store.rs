//! Storage ports for the payment core.
//!
//! The ledger, token issuer, and download gate are written against these
//! traits rather than a concrete database so that the state machine can be
//! exercised with in-memory fakes (see [`crate::testing`]). Production wires
//! in the Postgres repositories from [`crate::db`].
//!
//! All cross-request coordination happens through the store's atomicity
//! guarantees; none of these traits assume in-process locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use inkstand_core::{
    Amount, DownloadTokenId, Email, GatewayOrderId, GatewayPaymentId, OrderId, OrderStatus,
    ProductId, PurchaserId,
};

/// Errors from a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Blob storage I/O error.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// A persisted order row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub purchaser_id: PurchaserId,
    pub product_id: ProductId,
    /// Amount charged in minor units. Immutable after creation.
    pub amount: Amount,
    pub status: OrderStatus,
    /// Assigned once when the gateway-side order is opened.
    pub gateway_order_id: Option<GatewayOrderId>,
    /// Assigned on successful capture.
    pub gateway_payment_id: Option<GatewayPaymentId>,
    pub created_at: DateTime<Utc>,
}

/// A persisted download token row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub id: DownloadTokenId,
    pub product_id: ProductId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Whether the token is still usable at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// A product as the payment core sees it: a price and a file reference.
/// Catalog management itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub price: Amount,
    /// Path of the deliverable, relative to the blob store root.
    pub file_path: String,
}

/// Result of attempting to bind a gateway order id to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The reference was bound (or was already bound to the same value).
    Bound,
    /// The order does not exist.
    OrderMissing,
    /// The order is already bound to a different gateway order id.
    AlreadyBound(GatewayOrderId),
    /// A different order already carries this gateway order id.
    TakenByAnotherOrder,
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new `Pending` order.
    async fn insert(
        &self,
        purchaser_id: PurchaserId,
        product_id: ProductId,
        amount: Amount,
    ) -> Result<OrderRecord, StoreError>;

    /// Bind the gateway order id, enforcing bind-once semantics atomically.
    async fn bind_gateway_order(
        &self,
        order_id: OrderId,
        gateway_order_id: &GatewayOrderId,
    ) -> Result<BindOutcome, StoreError>;

    /// Look up an order by its gateway order id.
    async fn find_by_gateway_order(
        &self,
        gateway_order_id: &GatewayOrderId,
    ) -> Result<Option<OrderRecord>, StoreError>;

    /// Atomically move the order out of `Pending` into `status`, recording
    /// the gateway payment id when present.
    ///
    /// Returns the updated row if this call performed the transition, or
    /// `None` if no pending order matched (absent, or already terminal).
    /// Two concurrent deliveries of the same outcome can therefore never
    /// both observe a fresh transition.
    async fn settle_if_pending(
        &self,
        gateway_order_id: &GatewayOrderId,
        status: OrderStatus,
        gateway_payment_id: Option<&GatewayPaymentId>,
    ) -> Result<Option<OrderRecord>, StoreError>;

    /// Whether at least one `Completed` order exists for the product.
    async fn any_completed_for_product(&self, product_id: ProductId)
    -> Result<bool, StoreError>;
}

/// Purchaser persistence, keyed by contact address.
#[async_trait]
pub trait PurchaserStore: Send + Sync {
    /// Create-if-absent by email; a no-op returning the existing id
    /// otherwise.
    async fn upsert(&self, email: &Email) -> Result<PurchaserId, StoreError>;

    /// Look up a purchaser's contact address.
    async fn email_of(&self, id: PurchaserId) -> Result<Option<Email>, StoreError>;
}

/// Download token persistence.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// The most recently created token for the product whose expiry is
    /// strictly after `now`.
    async fn latest_active_for_product(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, StoreError>;

    /// Insert a freshly minted token. Tokens are never mutated afterwards.
    async fn insert(&self, token: &TokenRecord) -> Result<(), StoreError>;

    /// Look up a token by id.
    async fn find(&self, id: DownloadTokenId) -> Result<Option<TokenRecord>, StoreError>;
}

/// Read-only view of the product catalog (owned by the catalog subsystem).
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Look up a product by id.
    async fn find(&self, id: ProductId) -> Result<Option<ProductRecord>, StoreError>;
}

/// Size information about a stored blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobMetadata {
    pub len: u64,
}

/// Opaque blob storage holding the deliverable files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Metadata for a blob, or `None` if it does not exist.
    async fn metadata(&self, path: &str) -> Result<Option<BlobMetadata>, StoreError>;

    /// Read the full contents of a blob.
    async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;
}
