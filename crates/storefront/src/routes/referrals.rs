//! Referral routes.

use axum::{
    Router,
    extract::State,
    routing::get,
};

use super::{ApiResponse, ApiResult, ok, paginated};
use crate::db::{ReferralRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Query};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{Paging, Referral};
use crate::services::referrals::{ReferralService, ReferralSummary};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/me", get(mine))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/", get(admin_index))
}

/// The caller's referral code, generated on first visit, and the
/// referrals they have made.
///
/// GET /api/referrals/me
pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> ApiResult<ReferralSummary> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let summary = ReferralService::new(state.pool()).summary(&user).await?;
    Ok(ok(summary))
}

/// GET /api/admin/referrals
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(paging): Query<Paging>,
) -> Result<Json<ApiResponse<Vec<Referral>>>> {
    let listing = ReferralRepository::new(state.pool()).list(paging).await?;
    Ok(paginated(listing, paging))
}
