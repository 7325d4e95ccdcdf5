//! In-memory doubles for the payment core's ports.
//!
//! Used by the unit tests and the integration suite; kept as a regular
//! module (not `#[cfg(test)]`) so `tests/` can reach it too.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use inkstand_core::{
    Amount, DownloadTokenId, Email, GatewayOrderId, GatewayPaymentId, OrderId, OrderStatus,
    ProductId, PurchaserId,
};

use crate::gateway::{GatewayError, OpenOrderRequest, OpenedOrder, PaymentGateway};
use crate::payments::store::{
    BindOutcome, BlobMetadata, BlobStore, OrderRecord, OrderStore, ProductCatalog, ProductRecord,
    PurchaserStore, StoreError, TokenRecord, TokenStore,
};
use crate::services::notifier::{Notifier, NotifyError, Receipt};

// =============================================================================
// MemoryStore: orders + purchasers + tokens
// =============================================================================

#[derive(Default)]
struct MemoryInner {
    purchasers: HashMap<PurchaserId, Email>,
    orders: HashMap<OrderId, OrderRecord>,
    tokens: Vec<TokenRecord>,
}

/// In-memory order, purchaser, and token store behind one mutex, so the
/// conditional-update semantics of the Postgres repositories are reproduced
/// faithfully (a settle observes and mutates state atomically).
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous purchaser upsert for test setup.
    pub fn upsert_purchaser(&self, email: &Email) -> PurchaserId {
        let mut inner = self.inner.lock().unwrap();
        if let Some((id, _)) = inner.purchasers.iter().find(|&(_, e)| e == email) {
            return *id;
        }
        let id = PurchaserId::generate();
        inner.purchasers.insert(id, email.clone());
        id
    }

    /// Seed an order already bound to a gateway order id.
    pub fn seed_order(
        &self,
        purchaser_id: PurchaserId,
        product_id: ProductId,
        amount: Amount,
        gateway_order_id: &str,
    ) -> GatewayOrderId {
        let gateway_order_id: GatewayOrderId = gateway_order_id.parse().unwrap();
        let record = OrderRecord {
            id: OrderId::generate(),
            purchaser_id,
            product_id,
            amount,
            status: OrderStatus::Pending,
            gateway_order_id: Some(gateway_order_id.clone()),
            gateway_payment_id: None,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .unwrap()
            .orders
            .insert(record.id, record);
        gateway_order_id
    }

    /// Synchronous settle for test setup.
    pub fn settle(
        &self,
        gateway_order_id: &GatewayOrderId,
        status: OrderStatus,
        gateway_payment_id: Option<&str>,
    ) -> Option<OrderRecord> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .values_mut()
            .find(|o| o.gateway_order_id.as_ref() == Some(gateway_order_id))?;
        order.status = status;
        if let Some(payment) = gateway_payment_id {
            order.gateway_payment_id = Some(payment.parse().unwrap());
        }
        Some(order.clone())
    }

    /// Insert a token row directly (e.g. an already-expired one).
    pub fn insert_token_record(&self, token: TokenRecord) {
        self.inner.lock().unwrap().tokens.push(token);
    }

    /// Simulate administrative removal of a product's orders.
    pub fn remove_orders_for_product(&self, product_id: ProductId) {
        self.inner
            .lock()
            .unwrap()
            .orders
            .retain(|_, o| o.product_id != product_id);
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert(
        &self,
        purchaser_id: PurchaserId,
        product_id: ProductId,
        amount: Amount,
    ) -> Result<OrderRecord, StoreError> {
        let record = OrderRecord {
            id: OrderId::generate(),
            purchaser_id,
            product_id,
            amount,
            status: OrderStatus::Pending,
            gateway_order_id: None,
            gateway_payment_id: None,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .unwrap()
            .orders
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn bind_gateway_order(
        &self,
        order_id: OrderId,
        gateway_order_id: &GatewayOrderId,
    ) -> Result<BindOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let taken = inner.orders.values().any(|o| {
            o.id != order_id && o.gateway_order_id.as_ref() == Some(gateway_order_id)
        });
        if taken {
            return Ok(BindOutcome::TakenByAnotherOrder);
        }

        let Some(order) = inner.orders.get_mut(&order_id) else {
            return Ok(BindOutcome::OrderMissing);
        };
        match &order.gateway_order_id {
            None => {
                order.gateway_order_id = Some(gateway_order_id.clone());
                Ok(BindOutcome::Bound)
            }
            Some(existing) if existing == gateway_order_id => Ok(BindOutcome::Bound),
            Some(existing) => Ok(BindOutcome::AlreadyBound(existing.clone())),
        }
    }

    async fn find_by_gateway_order(
        &self,
        gateway_order_id: &GatewayOrderId,
    ) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .orders
            .values()
            .find(|o| o.gateway_order_id.as_ref() == Some(gateway_order_id))
            .cloned())
    }

    async fn settle_if_pending(
        &self,
        gateway_order_id: &GatewayOrderId,
        status: OrderStatus,
        gateway_payment_id: Option<&GatewayPaymentId>,
    ) -> Result<Option<OrderRecord>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(order) = inner.orders.values_mut().find(|o| {
            o.gateway_order_id.as_ref() == Some(gateway_order_id)
                && o.status == OrderStatus::Pending
        }) else {
            return Ok(None);
        };
        order.status = status;
        if let Some(payment) = gateway_payment_id {
            order.gateway_payment_id = Some(payment.clone());
        }
        Ok(Some(order.clone()))
    }

    async fn any_completed_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .orders
            .values()
            .any(|o| o.product_id == product_id && o.status == OrderStatus::Completed))
    }
}

#[async_trait]
impl PurchaserStore for MemoryStore {
    async fn upsert(&self, email: &Email) -> Result<PurchaserId, StoreError> {
        Ok(self.upsert_purchaser(email))
    }

    async fn email_of(&self, id: PurchaserId) -> Result<Option<Email>, StoreError> {
        Ok(self.inner.lock().unwrap().purchasers.get(&id).cloned())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn latest_active_for_product(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .tokens
            .iter()
            .rev()
            .find(|t| t.product_id == product_id && t.is_active_at(now))
            .cloned())
    }

    async fn insert(&self, token: &TokenRecord) -> Result<(), StoreError> {
        self.inner.lock().unwrap().tokens.push(token.clone());
        Ok(())
    }

    async fn find(&self, id: DownloadTokenId) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .tokens
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }
}

// =============================================================================
// StaticCatalog
// =============================================================================

/// Fixed product catalog.
#[derive(Default)]
pub struct StaticCatalog {
    products: Mutex<HashMap<ProductId, ProductRecord>>,
}

impl StaticCatalog {
    #[must_use]
    pub fn with(products: Vec<ProductRecord>) -> Self {
        Self {
            products: Mutex::new(products.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub fn remove(&self, id: ProductId) {
        self.products.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl ProductCatalog for StaticCatalog {
    async fn find(&self, id: ProductId) -> Result<Option<ProductRecord>, StoreError> {
        Ok(self.products.lock().unwrap().get(&id).cloned())
    }
}

// =============================================================================
// MemoryBlobStore
// =============================================================================

/// Blob store over a map of path -> bytes.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: &str, bytes: Vec<u8>) {
        self.blobs.lock().unwrap().insert(path.to_owned(), bytes);
    }

    pub fn remove(&self, path: &str) {
        self.blobs.lock().unwrap().remove(path);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn metadata(&self, path: &str) -> Result<Option<BlobMetadata>, StoreError> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .get(path)
            .map(|bytes| BlobMetadata {
                len: bytes.len() as u64,
            }))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no blob at {path}"),
                ))
            })
    }
}

// =============================================================================
// RecordingNotifier
// =============================================================================

/// Notifier that records every receipt it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    receipts: Mutex<Vec<Receipt>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All receipts sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Receipt> {
        self.receipts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotifyError> {
        self.receipts.lock().unwrap().push(receipt.clone());
        Ok(())
    }
}

// =============================================================================
// FakeGateway
// =============================================================================

/// Gateway that hands out deterministic order ids without any I/O.
#[derive(Default)]
pub struct FakeGateway {
    counter: AtomicU64,
    requests: Mutex<Vec<OpenOrderRequest>>,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<OpenOrderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn open_order(&self, request: OpenOrderRequest) -> Result<OpenedOrder, GatewayError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let opened = OpenedOrder {
            id: format!("order_fake_{n}").parse().map_err(GatewayError::from)?,
            amount: request.amount.minor_units(),
            currency: request.currency.clone(),
        };
        self.requests.lock().unwrap().push(request);
        Ok(opened)
    }
}
