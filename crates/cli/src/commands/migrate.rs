//! Database migration command.
//!
//! Migration files live in `crates/storefront/migrations/` and are embedded
//! into the binary at compile time.

use super::connect;

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Connecting to storefront database...");
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
