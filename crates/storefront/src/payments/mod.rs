//! Payment reconciliation and download authorization.
//!
//! The four pieces with real correctness hazards live here:
//!
//! - [`signature`] - proves inbound messages originated from the gateway
//! - [`ledger`] - the order state machine; owns transitions and idempotency
//! - [`tokens`] - mints/reuses time-limited download capability tokens
//! - [`gate`] - validates token + order state before releasing file bytes
//!
//! [`store`] defines the persistence ports these are written against, and
//! [`events`] the webhook envelope. See `crate::db` for the Postgres
//! adapters and `crate::testing` for the in-memory ones.

pub mod error;
pub mod events;
pub mod gate;
pub mod ledger;
pub mod signature;
pub mod store;
pub mod tokens;

pub use error::PaymentError;
pub use gate::{Decision, DenyReason, DownloadGate, DownloadGrant};
pub use ledger::{OrderLedger, SettledOrder};
pub use signature::SignatureVerifier;
pub use tokens::{IssuedToken, TokenIssuer};
