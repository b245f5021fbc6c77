//! Seed reference data.
//!
//! Inserts the system categories and writes a default document for every
//! settings singleton that has none. Existing rows are left alone, so the
//! command is safe to re-run.

use canopy_storefront::db::{CategoryRepository, SettingsRepository};
use canopy_storefront::models::{
    LoyaltyConfig, Navigation, PaymentSettings, SettingsDocument, ShippingSettings,
};
use sqlx::PgPool;

use super::{CommandError, connect};

/// Categories every store starts with, as `(name, slug)`. These cannot be
/// deleted from the back office.
pub const SYSTEM_CATEGORIES: [(&str, &str); 6] = [
    ("Flower", "flower"),
    ("Pre-Rolls", "pre-rolls"),
    ("Vapes", "vapes"),
    ("Edibles", "edibles"),
    ("Concentrates", "concentrates"),
    ("Accessories", "accessories"),
];

/// Seed categories and settings.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a write fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    let categories = CategoryRepository::new(&pool);
    let mut inserted = 0;
    for ((name, slug), sort_order) in SYSTEM_CATEGORIES.iter().zip(0..) {
        if categories.ensure_system(name, slug, sort_order).await? {
            inserted += 1;
        }
    }
    tracing::info!(inserted, total = SYSTEM_CATEGORIES.len(), "System categories seeded");

    init_settings::<ShippingSettings>(&pool).await?;
    init_settings::<PaymentSettings>(&pool).await?;
    init_settings::<Navigation>(&pool).await?;
    init_settings::<LoyaltyConfig>(&pool).await?;

    tracing::info!("Seeding complete!");
    Ok(())
}

async fn init_settings<T: SettingsDocument>(pool: &PgPool) -> Result<(), CommandError> {
    SettingsRepository::new(pool).get_or_init::<T>().await?;
    tracing::info!(key = T::KEY, "Settings document ready");
    Ok(())
}
