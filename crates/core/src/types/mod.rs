//! Core types for Inkstand.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod amount;
pub mod email;
pub mod gateway;
pub mod id;
pub mod status;

pub use amount::{Amount, AmountError};
pub use email::{Email, EmailError};
pub use gateway::{GatewayIdError, GatewayOrderId, GatewayPaymentId};
pub use id::*;
pub use status::{OrderStatus, OrderStatusError, PaymentOutcome};
