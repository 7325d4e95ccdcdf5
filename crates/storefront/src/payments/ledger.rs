//! The order ledger: the authoritative state machine for a purchase.
//!
//! Earlier iterations of the storefront mutated order state from several ad
//! hoc entry points (the confirmation endpoint wrote one shape, the webhook
//! handler upserted another). Everything now funnels through
//! [`OrderLedger::apply_outcome`], keyed by the gateway order id, so the
//! synchronous confirmation path and the asynchronous webhook path race
//! safely: whichever arrives first wins, the second is a no-op, and no order
//! ever leaves a terminal state.

use std::sync::Arc;

use inkstand_core::{
    Email, GatewayOrderId, GatewayPaymentId, OrderId, PaymentOutcome, ProductId,
};

use super::error::PaymentError;
use super::store::{BindOutcome, OrderRecord, OrderStore, ProductCatalog, PurchaserStore};
use super::tokens::{IssuedToken, TokenIssuer};
use crate::services::notifier::{Notifier, Receipt};

/// Bound on conditional-update retries when a transition races.
const MAX_SETTLE_ATTEMPTS: usize = 2;

/// The result of applying a payment outcome.
#[derive(Debug, Clone)]
pub struct SettledOrder {
    /// The order in its (terminal) state after the call.
    pub order: OrderRecord,
    /// The download token made available; always present on `Success`.
    pub token: Option<IssuedToken>,
}

/// Owns order state transitions and enforces idempotency.
///
/// All collaborators are constructor-injected so tests can substitute fakes.
#[derive(Clone)]
pub struct OrderLedger {
    orders: Arc<dyn OrderStore>,
    purchasers: Arc<dyn PurchaserStore>,
    catalog: Arc<dyn ProductCatalog>,
    issuer: TokenIssuer,
    notifier: Arc<dyn Notifier>,
}

impl OrderLedger {
    /// Create a ledger over the given collaborators.
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        purchasers: Arc<dyn PurchaserStore>,
        catalog: Arc<dyn ProductCatalog>,
        issuer: TokenIssuer,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orders,
            purchasers,
            catalog,
            issuer,
            notifier,
        }
    }

    /// Record a purchase intent: upsert the purchaser by contact address and
    /// insert a `Pending` order at the product's catalog price.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Validation`] for an unknown product (the
    /// amount itself cannot be non-positive: [`inkstand_core::Amount`]
    /// enforces that at construction). Store failures propagate.
    pub async fn create_order(
        &self,
        purchaser: &Email,
        product_id: ProductId,
    ) -> Result<OrderRecord, PaymentError> {
        let product = self
            .catalog
            .find(product_id)
            .await?
            .ok_or_else(|| PaymentError::Validation(format!("unknown product {product_id}")))?;

        let purchaser_id = self.purchasers.upsert(purchaser).await?;
        let order = self
            .orders
            .insert(purchaser_id, product.id, product.price)
            .await?;

        tracing::info!(order_id = %order.id, product_id = %product.id, amount = %order.amount, "order created");
        Ok(order)
    }

    /// Bind the immutable gateway order id once a gateway-side order has
    /// been opened. Idempotent when re-bound to the same value (retried
    /// creation); a different value is a conflict.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotFound`] for an unknown order and
    /// [`PaymentError::Conflict`] if a different reference is already bound.
    pub async fn attach_gateway_reference(
        &self,
        order_id: OrderId,
        gateway_order_id: &GatewayOrderId,
    ) -> Result<(), PaymentError> {
        match self
            .orders
            .bind_gateway_order(order_id, gateway_order_id)
            .await?
        {
            BindOutcome::Bound => Ok(()),
            BindOutcome::OrderMissing => {
                Err(PaymentError::NotFound(format!("order {order_id} not found")))
            }
            BindOutcome::AlreadyBound(existing) => Err(PaymentError::Conflict(format!(
                "order {order_id} already bound to gateway order {existing}"
            ))),
            BindOutcome::TakenByAnotherOrder => Err(PaymentError::Conflict(format!(
                "gateway order {gateway_order_id} is bound to another order"
            ))),
        }
    }

    /// Apply a verified payment outcome. The single authoritative entry
    /// point for both the confirmation path and the webhook path.
    ///
    /// A fresh `Pending -> Completed` transition issues (or reuses) a
    /// download token and sends the receipt before returning, so any caller
    /// observing `Completed` can assume a valid token exists. Reapplying the
    /// same outcome to a settled order is a no-op; the opposite outcome is a
    /// conflict that is logged for manual review, never silently applied.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::NotFound`] if no order carries `gateway_order_id`
    ///   (retryable: the gateway record may race ahead of local creation).
    /// - [`PaymentError::Conflict`] for a terminal-state regression.
    pub async fn apply_outcome(
        &self,
        gateway_order_id: &GatewayOrderId,
        outcome: PaymentOutcome,
        gateway_payment_id: Option<&GatewayPaymentId>,
    ) -> Result<SettledOrder, PaymentError> {
        let target = outcome.target_status();

        for _ in 0..MAX_SETTLE_ATTEMPTS {
            if let Some(order) = self
                .orders
                .settle_if_pending(gateway_order_id, target, gateway_payment_id)
                .await?
            {
                // This call won the transition; downstream effects fire
                // exactly once, here.
                tracing::info!(
                    order_id = %order.id,
                    gateway_order_id = %gateway_order_id,
                    status = %order.status,
                    "order settled"
                );
                let token = match outcome {
                    PaymentOutcome::Success => {
                        let token = self.issuer.issue_or_reuse(order.product_id).await?;
                        self.notify_receipt(&order, token).await;
                        Some(token)
                    }
                    PaymentOutcome::Failure => None,
                };
                return Ok(SettledOrder { order, token });
            }

            let Some(order) = self.orders.find_by_gateway_order(gateway_order_id).await? else {
                return Err(PaymentError::NotFound(format!(
                    "no order for gateway order {gateway_order_id}"
                )));
            };

            if order.status.is_terminal() {
                if order.status != target {
                    tracing::error!(
                        order_id = %order.id,
                        gateway_order_id = %gateway_order_id,
                        status = %order.status,
                        reported = %target,
                        "contradictory outcome for a settled order; manual review required"
                    );
                    return Err(PaymentError::Conflict(format!(
                        "order {} is {}; cannot apply {}",
                        order.id, order.status, target
                    )));
                }
                // Duplicate delivery is expected; hand back a valid token
                // without re-triggering receipt or issuance side effects
                // beyond reuse.
                let token = match outcome {
                    PaymentOutcome::Success => {
                        Some(self.issuer.issue_or_reuse(order.product_id).await?)
                    }
                    PaymentOutcome::Failure => None,
                };
                return Ok(SettledOrder { order, token });
            }

            // The conditional update missed but the order still reads
            // Pending: a concurrent settle rolled back or the read raced.
            // Retry the conditional update.
        }

        Err(PaymentError::Conflict(format!(
            "transition for gateway order {gateway_order_id} kept racing"
        )))
    }

    /// Read-only lookup by gateway order id, used by the success page.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Store`] if the store fails.
    pub async fn find_by_gateway_order(
        &self,
        gateway_order_id: &GatewayOrderId,
    ) -> Result<Option<OrderRecord>, PaymentError> {
        Ok(self.orders.find_by_gateway_order(gateway_order_id).await?)
    }

    /// Send the receipt for a freshly completed order. Failures are logged,
    /// never propagated: the transition has already been persisted and the
    /// provider must still receive an acknowledgement.
    async fn notify_receipt(&self, order: &OrderRecord, token: IssuedToken) {
        let email = match self.purchasers.email_of(order.purchaser_id).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                tracing::error!(order_id = %order.id, "purchaser missing for completed order");
                return;
            }
            Err(err) => {
                tracing::error!(order_id = %order.id, error = %err, "failed to load purchaser for receipt");
                return;
            }
        };

        let product_name = match self.catalog.find(order.product_id).await {
            Ok(Some(product)) => product.name,
            Ok(None) | Err(_) => order.product_id.to_string(),
        };

        let receipt = Receipt {
            email,
            order_id: order.id,
            product_name,
            amount: order.amount,
            download_token: token.id,
            download_expires_at: token.expires_at,
        };

        if let Err(err) = self.notifier.send_receipt(&receipt).await {
            tracing::error!(order_id = %order.id, error = %err, "receipt delivery failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use inkstand_core::{Amount, OrderStatus};

    use super::*;
    use crate::payments::store::ProductRecord;
    use crate::testing::{MemoryStore, RecordingNotifier, StaticCatalog};

    struct Fixture {
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        ledger: OrderLedger,
        product: ProductId,
    }

    fn fixture() -> Fixture {
        let product = ProductId::generate();
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(StaticCatalog::with(vec![ProductRecord {
            id: product,
            name: "Letterpress Kit".to_owned(),
            price: Amount::new(50_000).unwrap(),
            file_path: "letterpress-kit.zip".to_owned(),
        }]));
        let notifier = Arc::new(RecordingNotifier::new());
        let ledger = OrderLedger::new(
            store.clone(),
            store.clone(),
            catalog,
            TokenIssuer::new(store.clone()),
            notifier.clone(),
        );
        Fixture {
            store,
            notifier,
            ledger,
            product,
        }
    }

    fn buyer() -> Email {
        Email::parse("buyer@example.com").unwrap()
    }

    fn txn(s: &str) -> GatewayOrderId {
        s.parse().unwrap()
    }

    fn pay(s: &str) -> GatewayPaymentId {
        s.parse().unwrap()
    }

    async fn pending_order(fix: &Fixture, gateway_id: &str) -> OrderRecord {
        let order = fix.ledger.create_order(&buyer(), fix.product).await.unwrap();
        fix.ledger
            .attach_gateway_reference(order.id, &txn(gateway_id))
            .await
            .unwrap();
        order
    }

    #[tokio::test]
    async fn test_create_order_starts_pending_at_catalog_price() {
        let fix = fixture();
        let order = fix.ledger.create_order(&buyer(), fix.product).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.amount.minor_units(), 50_000);
        assert!(order.gateway_order_id.is_none());
    }

    #[tokio::test]
    async fn test_create_order_rejects_unknown_product() {
        let fix = fixture();
        let err = fix
            .ledger
            .create_order(&buyer(), ProductId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_order_upserts_purchaser_by_email() {
        let fix = fixture();
        let first = fix.ledger.create_order(&buyer(), fix.product).await.unwrap();
        let second = fix.ledger.create_order(&buyer(), fix.product).await.unwrap();
        assert_eq!(first.purchaser_id, second.purchaser_id);
    }

    #[tokio::test]
    async fn test_attach_is_idempotent_on_same_value() {
        let fix = fixture();
        let order = fix.ledger.create_order(&buyer(), fix.product).await.unwrap();

        fix.ledger
            .attach_gateway_reference(order.id, &txn("txn_1"))
            .await
            .unwrap();
        // Retried creation re-binds the same value: no-op.
        fix.ledger
            .attach_gateway_reference(order.id, &txn("txn_1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_attach_conflicts_on_different_value() {
        let fix = fixture();
        let order = fix.ledger.create_order(&buyer(), fix.product).await.unwrap();

        fix.ledger
            .attach_gateway_reference(order.id, &txn("txn_1"))
            .await
            .unwrap();
        let err = fix
            .ledger
            .attach_gateway_reference(order.id, &txn("txn_2"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_attach_unknown_order_is_not_found() {
        let fix = fixture();
        let err = fix
            .ledger
            .attach_gateway_reference(OrderId::generate(), &txn("txn_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_success_completes_and_issues_token() {
        let fix = fixture();
        pending_order(&fix, "txn_1").await;

        let settled = fix
            .ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Success, Some(&pay("pay_1")))
            .await
            .unwrap();

        assert_eq!(settled.order.status, OrderStatus::Completed);
        assert_eq!(settled.order.gateway_payment_id, Some(pay("pay_1")));
        assert!(settled.token.is_some());
        assert_eq!(fix.notifier.sent().len(), 1);
        assert_eq!(fix.notifier.sent()[0].email, buyer());
    }

    #[tokio::test]
    async fn test_duplicate_success_is_noop_with_valid_token() {
        let fix = fixture();
        pending_order(&fix, "txn_1").await;

        let first = fix
            .ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Success, Some(&pay("pay_1")))
            .await
            .unwrap();
        let second = fix
            .ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Success, Some(&pay("pay_1")))
            .await
            .unwrap();

        assert_eq!(second.order.status, OrderStatus::Completed);
        // Same still-valid token is reused, and exactly one receipt went out.
        assert_eq!(second.token.unwrap().id, first.token.unwrap().id);
        assert_eq!(fix.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_settles_without_side_effects() {
        let fix = fixture();
        pending_order(&fix, "txn_1").await;

        let settled = fix
            .ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Failure, None)
            .await
            .unwrap();

        assert_eq!(settled.order.status, OrderStatus::Failed);
        assert!(settled.token.is_none());
        assert!(fix.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_failure_is_noop() {
        let fix = fixture();
        pending_order(&fix, "txn_1").await;

        fix.ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Failure, None)
            .await
            .unwrap();
        let second = fix
            .ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Failure, None)
            .await
            .unwrap();
        assert_eq!(second.order.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_failure_after_completed_is_conflict() {
        let fix = fixture();
        pending_order(&fix, "txn_1").await;

        fix.ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Success, Some(&pay("pay_1")))
            .await
            .unwrap();
        let err = fix
            .ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Failure, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Conflict(_)));

        // The order must not have regressed.
        let order = fix
            .ledger
            .find_by_gateway_order(&txn("txn_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_success_after_failed_is_conflict() {
        let fix = fixture();
        pending_order(&fix, "txn_1").await;

        fix.ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Failure, None)
            .await
            .unwrap();
        let err = fix
            .ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Success, Some(&pay("pay_1")))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Conflict(_)));
        assert!(fix.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_gateway_order_is_not_found() {
        let fix = fixture();
        let err = fix
            .ledger
            .apply_outcome(&txn("txn_missing"), PaymentOutcome::Success, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_no_terminal_state_ever_changes() {
        // Terminal stickiness: after settling, no sequence of further
        // outcomes moves the order.
        let fix = fixture();
        pending_order(&fix, "txn_1").await;
        fix.ledger
            .apply_outcome(&txn("txn_1"), PaymentOutcome::Success, Some(&pay("pay_1")))
            .await
            .unwrap();

        for outcome in [PaymentOutcome::Success, PaymentOutcome::Failure] {
            let _ = fix.ledger.apply_outcome(&txn("txn_1"), outcome, None).await;
            let order = fix
                .ledger
                .find_by_gateway_order(&txn("txn_1"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(order.status, OrderStatus::Completed);
        }
    }
}
