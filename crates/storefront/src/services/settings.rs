//! Read-through caches for the settings singletons.
//!
//! Each settings type gets one [`SettingsStore`]. The first successful read
//! fills the cache and later reads never touch the database until an admin
//! saves a new document or clears the caches. A failed read falls back to
//! the type's default and leaves the cache empty so the next request
//! retries.

use moka::future::Cache;
use sqlx::PgPool;

use crate::db::{RepositoryError, SettingsRepository};
use crate::models::SettingsDocument;

/// Single-entry cache in front of one settings row.
#[derive(Clone)]
pub struct SettingsStore<T: SettingsDocument> {
    cache: Cache<(), T>,
}

impl<T: SettingsDocument> Default for SettingsStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SettingsDocument> SettingsStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).build(),
        }
    }

    /// Current document, loading (and if needed inserting) it on a miss.
    ///
    /// Never fails: a database error is logged and the default returned.
    pub async fn get(&self, pool: &PgPool) -> T {
        let loaded = self
            .cache
            .try_get_with((), async {
                SettingsRepository::new(pool).get_or_init::<T>().await
            })
            .await;

        match loaded {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    key = T::KEY,
                    error = %e,
                    "Settings unavailable, serving defaults"
                );
                T::default()
            }
        }
    }

    /// Persist a new document and cache it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails; the cached
    /// value is left as it was.
    pub async fn save(&self, pool: &PgPool, doc: T) -> Result<T, RepositoryError> {
        SettingsRepository::new(pool).put(&doc).await?;
        self.cache.insert((), doc.clone()).await;
        tracing::info!(key = T::KEY, "Settings saved");
        Ok(doc)
    }

    /// Drop the cached document so the next read goes to the database.
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Whether a document is currently cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.contains_key(&())
    }
}
