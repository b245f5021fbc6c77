//! Loyalty programme routes.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use canopy_core::LoyaltyRewardId;

use super::{ApiResponse, ApiResult, Deleted, created, ok};
use crate::db::LoyaltyRewardRepository;
use crate::error::{AppError, Result};
use crate::extract::{Json, Path};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{LoyaltyCoupon, LoyaltyReward, LoyaltyRewardInput};
use crate::services::loyalty::{LoyaltyService, LoyaltySummary};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub reward_id: LoyaltyRewardId,
}

/// What a redemption hands back.
#[derive(Debug, Serialize)]
pub struct Redemption {
    pub coupon: LoyaltyCoupon,
    pub points: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(summary))
        .route("/redeem", post(redeem))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/rewards", get(admin_rewards).post(create_reward))
        .route("/rewards/{id}", put(update_reward).delete(delete_reward))
}

/// GET /api/loyalty
pub async fn summary(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> ApiResult<LoyaltySummary> {
    let config = state.loyalty().get(state.pool()).await;
    let summary = LoyaltyService::new(state.pool())
        .summary(current.id, config)
        .await?;
    Ok(ok(summary))
}

/// POST /api/loyalty/redeem
#[tracing::instrument(skip_all, fields(user_id = %current.id, reward_id = %body.reward_id))]
pub async fn redeem(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<RedeemRequest>,
) -> ApiResult<Redemption> {
    let config = state.loyalty().get(state.pool()).await;
    let (user, coupon) = LoyaltyService::new(state.pool())
        .redeem(current.id, body.reward_id, &config)
        .await?;
    Ok(ok(Redemption {
        coupon,
        points: user.loyalty_points,
    }))
}

// =============================================================================
// Admin
// =============================================================================

/// GET /api/admin/loyalty/rewards
pub async fn admin_rewards(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> ApiResult<Vec<LoyaltyReward>> {
    let rewards = LoyaltyRewardRepository::new(state.pool()).list(true).await?;
    Ok(ok(rewards))
}

/// POST /api/admin/loyalty/rewards
#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_reward(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<LoyaltyRewardInput>,
) -> Result<(StatusCode, Json<ApiResponse<LoyaltyReward>>)> {
    input.validate()?;
    let reward = LoyaltyRewardRepository::new(state.pool())
        .create(&input)
        .await?;
    tracing::info!(reward_id = %reward.id, "Loyalty reward created");
    Ok(created(reward))
}

/// PUT /api/admin/loyalty/rewards/{id}
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, reward_id = %id))]
pub async fn update_reward(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<LoyaltyRewardId>,
    Json(input): Json<LoyaltyRewardInput>,
) -> ApiResult<LoyaltyReward> {
    input.validate()?;
    let reward = LoyaltyRewardRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(ok(reward))
}

/// DELETE /api/admin/loyalty/rewards/{id}
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, reward_id = %id))]
pub async fn delete_reward(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<LoyaltyRewardId>,
) -> ApiResult<Deleted> {
    if !LoyaltyRewardRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::not_found("reward"));
    }
    Ok(ok(Deleted { deleted: true }))
}
