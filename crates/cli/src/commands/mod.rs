//! CLI subcommand implementations.

pub mod migrate;
pub mod seed;

use secrecy::{ExposeSecret, SecretString};

/// Load the storefront database URL, falling back to `DATABASE_URL`.
pub(crate) fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();

    std::env::var("STORE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MissingDatabaseUrl)
}

/// Connect to the storefront database.
pub(crate) async fn connect() -> Result<sqlx::PgPool, Box<dyn std::error::Error>> {
    let url = database_url()?;
    Ok(sqlx::PgPool::connect(url.expose_secret()).await?)
}

#[derive(Debug, thiserror::Error)]
#[error("Neither STORE_DATABASE_URL nor DATABASE_URL is set")]
pub(crate) struct MissingDatabaseUrl;
