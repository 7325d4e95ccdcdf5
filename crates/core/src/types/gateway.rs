//! Identifiers assigned by the payment gateway.
//!
//! The gateway order id is the join key between a local order and every
//! provider-originated event about it. Both identifiers are opaque strings
//! from our point of view; the only validation is non-emptiness.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error constructing a gateway identifier.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayIdError {
    /// The identifier was empty.
    #[error("gateway identifier cannot be empty")]
    Empty,
}

macro_rules! gateway_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Construct from a provider-supplied string.
            ///
            /// # Errors
            ///
            /// Returns [`GatewayIdError::Empty`] for an empty or
            /// whitespace-only string.
            pub fn parse(s: &str) -> Result<Self, GatewayIdError> {
                let s = s.trim();
                if s.is_empty() {
                    return Err(GatewayIdError::Empty);
                }
                Ok(Self(s.to_owned()))
            }

            /// The identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = GatewayIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

gateway_id! {
    /// The transaction id the gateway assigns when an order is opened on its
    /// side. Unique per order, immutable once bound.
    GatewayOrderId
}

gateway_id! {
    /// The payment id the gateway assigns to a captured payment.
    GatewayPaymentId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(GatewayOrderId::parse(""), Err(GatewayIdError::Empty));
        assert_eq!(GatewayPaymentId::parse("  "), Err(GatewayIdError::Empty));
    }

    #[test]
    fn test_parse_keeps_value() {
        let id = GatewayOrderId::parse("order_MkWav2Tw1GKZ9U").unwrap();
        assert_eq!(id.as_str(), "order_MkWav2Tw1GKZ9U");
        assert_eq!(id.to_string(), "order_MkWav2Tw1GKZ9U");
    }

    #[test]
    fn test_distinct_types() {
        // GatewayOrderId and GatewayPaymentId are deliberately separate
        // types even though both wrap strings.
        let order: GatewayOrderId = "order_1".parse().unwrap();
        let payment: GatewayPaymentId = "pay_1".parse().unwrap();
        assert_eq!(order.as_str(), "order_1");
        assert_eq!(payment.as_str(), "pay_1");
    }
}
