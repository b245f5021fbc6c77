//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! canopy migrate
//! ```
//!
//! Applies `crates/storefront/migrations/` and then creates the session
//! table used by the storefront's `PostgreSQL` session store.

use canopy_storefront::middleware::session_store;

use super::{CommandError, connect};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Creating session store table...");
    session_store(&pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
