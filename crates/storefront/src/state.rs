//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::models::{LoyaltyConfig, Navigation, PaymentSettings, ShippingSettings};
use crate::services::settings::SettingsStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections, configuration and the
/// settings caches.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    shipping: SettingsStore<ShippingSettings>,
    payment: SettingsStore<PaymentSettings>,
    navigation: SettingsStore<Navigation>,
    loyalty: SettingsStore<LoyaltyConfig>,
}

impl AppState {
    /// Create a new application state with empty settings caches.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                shipping: SettingsStore::new(),
                payment: SettingsStore::new(),
                navigation: SettingsStore::new(),
                loyalty: SettingsStore::new(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn shipping(&self) -> &SettingsStore<ShippingSettings> {
        &self.inner.shipping
    }

    #[must_use]
    pub fn payment(&self) -> &SettingsStore<PaymentSettings> {
        &self.inner.payment
    }

    #[must_use]
    pub fn navigation(&self) -> &SettingsStore<Navigation> {
        &self.inner.navigation
    }

    #[must_use]
    pub fn loyalty(&self) -> &SettingsStore<LoyaltyConfig> {
        &self.inner.loyalty
    }

    /// Empty every settings cache.
    pub async fn clear_settings_caches(&self) {
        self.inner.shipping.clear().await;
        self.inner.payment.clear().await;
        self.inner.navigation.clear().await;
        self.inner.loyalty.clear().await;
    }
}
