//! Database operations for the Canopy `PostgreSQL` database.
//!
//! # Tables
//!
//! - `users` - Accounts, roles, loyalty balance and referral codes
//! - `categories` / `products` / `product_categories` - Catalog
//! - `orders` - Placed orders with item, address and tracking documents
//! - `pages` / `posts` - CMS content
//! - `settings` - One row per settings singleton
//! - `loyalty_rewards` / `referrals`
//! - `tower_sessions.session` - Session storage (created by the store)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p canopy-cli -- migrate
//! ```

pub mod categories;
pub mod content;
pub mod loyalty;
pub mod orders;
pub mod products;
pub mod referrals;
pub mod settings;
pub mod users;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use categories::CategoryRepository;
pub use content::{PageRepository, PostRepository};
pub use loyalty::LoyaltyRewardRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use referrals::ReferralRepository;
pub use settings::SettingsRepository;
pub use users::UserRepository;

/// Maximum pooled connections.
const MAX_CONNECTIONS: u32 = 10;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation, carrying a client-facing message.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map constraint violations from a write to `Conflict`.
    ///
    /// A unique violation carries `duplicate_message`; a dangling foreign key
    /// gets a generic message. Anything else stays a `Database` error.
    pub(crate) fn from_write(err: sqlx::Error, duplicate_message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::Conflict(duplicate_message.to_owned());
            }
            if db_err.is_foreign_key_violation() {
                return Self::Conflict("A referenced record does not exist".to_owned());
            }
        }
        Self::Database(err)
    }

    pub(crate) fn corrupt(what: &str, err: impl std::fmt::Display) -> Self {
        Self::DataCorruption(format!("invalid {what} in database: {err}"))
    }
}

/// Escape `%`, `_` and backslash so user input matches literally inside `ILIKE`.
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// One page of a listing plus the total row count.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Create a `PostgreSQL` connection pool and connect immediately.
///
/// Used by the CLI, where failing fast on a bad URL is what we want.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Create a pool without connecting.
///
/// The server starts even while the database is unreachable; each query
/// then fails on its own and settings readers fall back to defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL cannot be parsed.
pub fn create_lazy_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url.expose_secret())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("blue dream"), "blue dream");
        assert_eq!(escape_like("100%_pure\\"), "100\\%\\_pure\\\\");
    }
}
