//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! mbuli-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection
//!   string
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded in the
//! storefront library at build time.

use mbuli_storefront::db::{MIGRATOR, create_pool};

use super::{CommandError, database_url};

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails or
/// a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to storefront database...");
    let pool = create_pool(&database_url).await?;

    tracing::info!("Running storefront migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
