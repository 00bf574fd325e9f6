//! Seed the product catalogue.
//!
//! Inserts the farm's six starter products. A catalogue that already has
//! products is left alone unless `--force` is given, in which case the
//! products are added again alongside the existing ones.

use mbuli_storefront::db::{PgStore, Store, create_pool, seed};

use super::{CommandError, database_url};

/// Seed the catalogue.
///
/// # Errors
///
/// Returns an error if the database URL is missing or a write fails.
pub async fn catalogue(force: bool) -> Result<(), CommandError> {
    let database_url = database_url()?;
    let pool = create_pool(&database_url).await?;
    let store = PgStore::new(pool);

    let existing = store.list_products(None).await?.len();
    if existing > 0 && !force {
        tracing::info!(existing, "Catalogue already has products, skipping (use --force)");
        return Ok(());
    }

    let mut inserted = 0_usize;
    for product in seed::catalogue() {
        let product = store.insert_product(product).await?;
        tracing::info!(
            product_id = %product.id,
            name = %product.name,
            stock_status = %product.stock_status,
            "Product added"
        );
        inserted += 1;
    }

    tracing::info!(inserted, "Seeding complete!");
    Ok(())
}
