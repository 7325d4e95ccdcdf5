//! Error taxonomy for the payment core.

use thiserror::Error;

use super::store::StoreError;

/// Errors surfaced by the order ledger, token issuer, and download gate.
///
/// Signature failures never reach this type: the verifier returns a plain
/// boolean and the HTTP boundary rejects unauthenticated requests before the
/// payment core is invoked.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Bad input shape or value; rejected before touching the store.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced entity is absent. On the webhook path this is
    /// retryable: the gateway record can race ahead of local creation.
    #[error("not found: {0}")]
    NotFound(String),

    /// A state-machine invariant was violated (terminal-state regression or
    /// mismatched gateway reference).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
