//! Settings singleton routes.
//!
//! Reads are public and served from the settings caches; writes need an
//! admin session and replace the whole document.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};

use super::{ApiResult, ok};
use crate::extract::Json;
use crate::middleware::RequireAdmin;
use crate::models::{LoyaltyConfig, Navigation, PaymentSettings, SettingsDocument, ShippingSettings};
use crate::services::settings::SettingsStore;
use crate::state::AppState;

/// A settings document with a cache in [`AppState`].
pub trait CachedSettings: SettingsDocument {
    fn store(state: &AppState) -> &SettingsStore<Self>;
}

impl CachedSettings for ShippingSettings {
    fn store(state: &AppState) -> &SettingsStore<Self> {
        state.shipping()
    }
}

impl CachedSettings for PaymentSettings {
    fn store(state: &AppState) -> &SettingsStore<Self> {
        state.payment()
    }
}

impl CachedSettings for Navigation {
    fn store(state: &AppState) -> &SettingsStore<Self> {
        state.navigation()
    }
}

impl CachedSettings for LoyaltyConfig {
    fn store(state: &AppState) -> &SettingsStore<Self> {
        state.loyalty()
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/shipping", get(show::<ShippingSettings>).put(replace::<ShippingSettings>))
        .route("/payment", get(show::<PaymentSettings>).put(replace::<PaymentSettings>))
        .route("/navigation", get(show::<Navigation>).put(replace::<Navigation>))
        .route("/loyalty", get(show::<LoyaltyConfig>).put(replace::<LoyaltyConfig>))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/cache/clear", post(clear_cache))
}

/// GET /api/settings/{kind}
pub async fn show<T: CachedSettings>(State(state): State<AppState>) -> ApiResult<T> {
    Ok(ok(T::store(&state).get(state.pool()).await))
}

/// PUT /api/settings/{kind}
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, key = T::KEY))]
pub async fn replace<T: CachedSettings>(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(doc): Json<T>,
) -> ApiResult<T> {
    doc.validate()?;
    let saved = T::store(&state).save(state.pool(), doc).await?;
    tracing::info!("Settings updated");
    Ok(ok(saved))
}

/// POST /api/admin/settings/cache/clear
#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn clear_cache(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> ApiResult<()> {
    state.clear_settings_caches().await;
    tracing::info!("Settings caches cleared");
    Ok(ok(()))
}
