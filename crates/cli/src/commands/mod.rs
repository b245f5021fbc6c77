//! Command implementations.
//!
//! Every command reads `CANOPY_DATABASE_URL` (falling back to
//! `DATABASE_URL`) and connects eagerly, so a bad URL fails before any work
//! starts.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use canopy_storefront::db::{self, RepositoryError};
use canopy_storefront::services::auth::AuthError;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Email or password rejected.
    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("No user with email: {0}")]
    UnknownUser(String),
}

/// Connect to the database named by the environment.
///
/// # Errors
///
/// Returns `CommandError::MissingEnvVar` when neither variable is set.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("CANOPY_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("CANOPY_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
