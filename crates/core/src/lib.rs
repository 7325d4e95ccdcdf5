//! Inkstand Core - Shared types library.
//!
//! This crate provides the common domain types used across the Inkstand
//! components:
//! - `storefront` - Public-facing digital goods shop and payment core
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, amounts, emails, gateway
//!   references, and order status

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
