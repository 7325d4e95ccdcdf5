//! Inkstand storefront: payment reconciliation and gated downloads.
//!
//! The storefront sells digital goods. Money flows through an external
//! payment gateway; this crate owns everything after "the buyer clicked
//! pay": the order ledger, signature verification for the gateway's two
//! callback channels, download token issuance, and the gate that decides
//! whether a presented token yields file bytes.
//!
//! # Architecture
//!
//! - Axum HTTP surface ([`routes`]) over shared [`state::AppState`]
//! - The payment core ([`payments`]) is written against storage ports, so
//!   its state machine runs identically on Postgres ([`db`]) and on the
//!   in-memory doubles ([`testing`])
//! - External collaborators ([`gateway`], [`services`]) are trait objects
//!   injected at assembly time

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
pub mod testing;
