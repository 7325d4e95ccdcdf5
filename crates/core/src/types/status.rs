//! Order lifecycle status and payment outcomes.
//!
//! Earlier iterations of the storefront represented order state as a boolean
//! "status" flag, which cannot distinguish a pending order from a failed one.
//! [`OrderStatus`] is the single canonical representation: `Pending` is the
//! only initial state, `Completed` and `Failed` are terminal.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Purchase intent recorded, payment not yet settled.
    #[default]
    Pending,
    /// Payment captured. Terminal.
    Completed,
    /// Payment failed. Terminal.
    Failed,
}

impl OrderStatus {
    /// Whether no further transition is permitted out of this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Canonical lowercase name, as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an [`OrderStatus`] from its stored form.
#[derive(thiserror::Error, Debug, Clone)]
#[error("invalid order status: {0}")]
pub struct OrderStatusError(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = OrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(OrderStatusError(other.to_owned())),
        }
    }
}

/// A verified payment outcome to apply to an order.
///
/// Both the synchronous confirmation path and the asynchronous webhook path
/// reduce to one of these two values before touching the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// The gateway captured the payment.
    Success,
    /// The gateway reported the payment as failed.
    Failure,
}

impl PaymentOutcome {
    /// The terminal state this outcome drives an order into.
    #[must_use]
    pub const fn target_status(self) -> OrderStatus {
        match self {
            Self::Success => OrderStatus::Completed,
            Self::Failure => OrderStatus::Failed,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
    }

    #[test]
    fn test_str_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Failed,
        ] {
            let parsed: OrderStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("PROCESSING".parse::<OrderStatus>().is_err());
        assert!("true".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_outcome_targets() {
        assert_eq!(
            PaymentOutcome::Success.target_status(),
            OrderStatus::Completed
        );
        assert_eq!(PaymentOutcome::Failure.target_status(), OrderStatus::Failed);
    }
}
