//! Database operations for the storefront `PostgreSQL`.
//!
//! # Tables
//!
//! - `purchasers` - Buyers, keyed by unique email
//! - `products` - Digital goods: price and deliverable file path
//! - `orders` - The order ledger rows
//! - `download_tokens` - Time-limited download capability tokens
//!
//! Each repository implements one of the ports in
//! [`crate::payments::store`]. All state transitions rely on conditional
//! `UPDATE`s rather than in-process locking, so any number of server
//! instances can share one database.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p inkstand-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod orders;
pub mod products;
pub mod purchasers;
pub mod tokens;

pub use orders::PgOrderStore;
pub use products::PgProductCatalog;
pub use purchasers::PgPurchaserStore;
pub use tokens::PgTokenStore;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
