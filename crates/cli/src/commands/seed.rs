//! Catalog seeding commands.

use inkstand_core::{Amount, ProductId};

use super::connect;

/// Insert a product into the catalog.
///
/// # Errors
///
/// Returns an error for a non-positive price or if the insert fails.
pub async fn product(
    name: &str,
    price_minor: i64,
    file_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let price = Amount::new(price_minor)?;
    let id = ProductId::generate();

    let pool = connect().await?;
    sqlx::query("INSERT INTO products (id, name, price_minor, file_path) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(name)
        .bind(price.minor_units())
        .bind(file_path)
        .execute(&pool)
        .await?;

    tracing::info!(product_id = %id, name, price_minor, file_path, "product created");
    Ok(())
}
