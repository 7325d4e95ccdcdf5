//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{PgOrderStore, PgProductCatalog, PgPurchaserStore, PgTokenStore};
use crate::gateway::{HttpGateway, PaymentGateway};
use crate::payments::store::{BlobStore, OrderStore, ProductCatalog, PurchaserStore, TokenStore};
use crate::payments::{DownloadGate, OrderLedger, SignatureVerifier, TokenIssuer};
use crate::services::blobs::FsBlobStore;
use crate::services::notifier::{LogOnlyNotifier, MailApiNotifier, Notifier};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    ledger: OrderLedger,
    gate: DownloadGate,
    verifier: SignatureVerifier,
    gateway: Arc<dyn PaymentGateway>,
    blobs: Arc<dyn BlobStore>,
    /// Public half of the gateway credentials, handed to the checkout widget.
    payments_key_id: String,
    currency: String,
    /// Absent in test assemblies, which run entirely on in-memory stores.
    pool: Option<PgPool>,
}

/// The collaborators behind [`AppState`], for assembling one by hand.
pub struct StateParts {
    pub orders: Arc<dyn OrderStore>,
    pub purchasers: Arc<dyn PurchaserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub blobs: Arc<dyn BlobStore>,
    pub notifier: Arc<dyn Notifier>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub verifier: SignatureVerifier,
    pub payments_key_id: String,
    pub currency: String,
}

impl AppState {
    /// Wire up production state: Postgres repositories, the HTTP gateway
    /// client, filesystem blob storage, and the configured mail API (or a
    /// log-only notifier when none is configured).
    #[must_use]
    pub fn new(config: &StorefrontConfig, pool: PgPool) -> Self {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpGateway::new(
            config.payments.api_base.clone(),
            config.payments.key_id.clone(),
            config.payments.key_secret.clone(),
        ));

        let notifier: Arc<dyn Notifier> = match &config.mailer {
            Some(mailer) => Arc::new(MailApiNotifier::new(
                mailer.api_url.clone(),
                mailer.api_key.clone(),
                mailer.from_address.clone(),
                config.base_url.clone(),
            )),
            None => Arc::new(LogOnlyNotifier),
        };

        let parts = StateParts {
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            purchasers: Arc::new(PgPurchaserStore::new(pool.clone())),
            tokens: Arc::new(PgTokenStore::new(pool.clone())),
            catalog: Arc::new(PgProductCatalog::new(pool.clone())),
            blobs: Arc::new(FsBlobStore::new(config.files_dir.clone())),
            notifier,
            gateway,
            verifier: SignatureVerifier::new(
                config.payments.key_secret.clone(),
                config.payments.webhook_secret.clone(),
            ),
            payments_key_id: config.payments.key_id.clone(),
            currency: config.payments.currency.clone(),
        };

        Self::assemble(parts, Some(pool))
    }

    /// Assemble state from explicit collaborators.
    #[must_use]
    pub fn assemble(parts: StateParts, pool: Option<PgPool>) -> Self {
        let issuer = TokenIssuer::new(parts.tokens.clone());
        let ledger = OrderLedger::new(
            parts.orders.clone(),
            parts.purchasers,
            parts.catalog.clone(),
            issuer,
            parts.notifier,
        );
        let gate = DownloadGate::new(
            parts.tokens,
            parts.orders,
            parts.catalog,
            parts.blobs.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                ledger,
                gate,
                verifier: parts.verifier,
                gateway: parts.gateway,
                blobs: parts.blobs,
                payments_key_id: parts.payments_key_id,
                currency: parts.currency,
                pool,
            }),
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &OrderLedger {
        &self.inner.ledger
    }

    #[must_use]
    pub fn gate(&self) -> &DownloadGate {
        &self.inner.gate
    }

    #[must_use]
    pub fn verifier(&self) -> &SignatureVerifier {
        &self.inner.verifier
    }

    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    #[must_use]
    pub fn blobs(&self) -> &dyn BlobStore {
        self.inner.blobs.as_ref()
    }

    #[must_use]
    pub fn payments_key_id(&self) -> &str {
        &self.inner.payments_key_id
    }

    #[must_use]
    pub fn currency(&self) -> &str {
        &self.inner.currency
    }

    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
