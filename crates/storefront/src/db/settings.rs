//! Settings singleton storage.
//!
//! One row per settings type in `settings (key, value)`.

use serde_json::Value as JsonValue;
use sqlx::PgPool;
use sqlx::types::Json;

use super::RepositoryError;
use crate::models::SettingsDocument;

pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the stored document, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored JSON does not
    /// match `T`.
    pub async fn get<T: SettingsDocument>(&self) -> Result<Option<T>, RepositoryError> {
        let value: Option<JsonValue> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
                .bind(T::KEY)
                .fetch_optional(self.pool)
                .await?;

        value
            .map(|v| serde_json::from_value(v).map_err(|e| RepositoryError::corrupt(T::KEY, e)))
            .transpose()
    }

    /// Return the stored document, inserting `T::default()` first if the
    /// row is missing.
    ///
    /// A concurrent first read may insert the same default; whichever row
    /// lands is returned to both.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_init<T: SettingsDocument>(&self) -> Result<T, RepositoryError> {
        if let Some(doc) = self.get::<T>().await? {
            return Ok(doc);
        }

        let inserted = sqlx::query(
            "INSERT INTO settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
        )
        .bind(T::KEY)
        .bind(Json(T::default()))
        .execute(self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            tracing::info!(key = T::KEY, "Inserted default settings");
            return Ok(T::default());
        }

        self.get::<T>().await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace the stored document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn put<T: SettingsDocument>(&self, doc: &T) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO settings (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            ",
        )
        .bind(T::KEY)
        .bind(Json(doc))
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
