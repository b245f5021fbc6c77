//! Back-office user management.

use axum::{
    Router,
    extract::State,
    routing::{get, patch, post},
};
use serde::Deserialize;

use canopy_core::{UserId, UserRole};

use super::{ApiResponse, ApiResult, ok, paginated};
use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{Paging, User};
use crate::services::loyalty::LoyaltyService;
use crate::state::AppState;

/// `?search=` on the user listing; matches email or name.
#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct PointsRequest {
    /// Points to add; negative to deduct.
    pub delta: i64,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{id}/role", patch(set_role))
        .route("/{id}/points", post(adjust_points))
}

/// GET /api/admin/users
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(filter): Query<UserFilter>,
    Query(paging): Query<Paging>,
) -> Result<Json<ApiResponse<Vec<User>>>> {
    let listing = UserRepository::new(state.pool())
        .list(paging, filter.search.as_deref())
        .await?;
    Ok(paginated(listing, paging))
}

/// Change a user's role. Takes effect at the user's next login.
///
/// PATCH /api/admin/users/{id}/role
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, user_id = %id, role = %body.role))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<RoleRequest>,
) -> ApiResult<User> {
    if id == admin.id && !body.role.is_admin() {
        return Err(AppError::bad_request("You cannot remove your own admin role"));
    }
    let user = UserRepository::new(state.pool())
        .set_role(id, body.role)
        .await?;
    tracing::info!("User role changed");
    Ok(ok(user))
}

/// POST /api/admin/users/{id}/points
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, user_id = %id, delta = body.delta))]
pub async fn adjust_points(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<PointsRequest>,
) -> ApiResult<User> {
    if body.delta == 0 {
        return Err(AppError::bad_request("delta must not be zero"));
    }
    let user = LoyaltyService::new(state.pool())
        .adjust(id, body.delta)
        .await?;
    Ok(ok(user))
}
