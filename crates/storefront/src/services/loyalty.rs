//! Loyalty points and reward redemption.

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use canopy_core::referral::random_code;
use canopy_core::{LoyaltyRewardId, UserId};

use crate::db::{LoyaltyRewardRepository, RepositoryError, UserRepository};
use crate::models::{LoyaltyConfig, LoyaltyCoupon, LoyaltyReward, User};

/// Prefix of every redeemed coupon code.
const COUPON_PREFIX: &str = "LOYAL-";

/// Random characters after the prefix.
const COUPON_CODE_LENGTH: usize = 6;

#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("The loyalty programme is not active")]
    Disabled,

    #[error("Reward not found")]
    RewardNotFound,

    #[error("Insufficient points: {cost} needed, {balance} available")]
    InsufficientPoints { cost: i64, balance: i64 },

    #[error("User not found")]
    UserNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl LoyaltyError {
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Repository(_))
    }
}

/// What `GET /api/loyalty` returns.
#[derive(Debug, Clone, Serialize)]
pub struct LoyaltySummary {
    pub points: i64,
    pub coupons: Vec<LoyaltyCoupon>,
    pub rewards: Vec<LoyaltyReward>,
    pub config: LoyaltyConfig,
}

/// A fresh `LOYAL-XXXXXX` coupon for `reward`.
#[must_use]
pub fn coupon_for(reward: &LoyaltyReward) -> LoyaltyCoupon {
    let suffix = random_code(&mut rand::rng(), COUPON_CODE_LENGTH);
    LoyaltyCoupon {
        code: format!("{COUPON_PREFIX}{suffix}"),
        reward_name: reward.name.clone(),
        discount_type: reward.discount_type,
        discount_value: reward.discount_value,
        used: false,
        created_at: Utc::now(),
    }
}

pub struct LoyaltyService<'a> {
    users: UserRepository<'a>,
    rewards: LoyaltyRewardRepository<'a>,
}

impl<'a> LoyaltyService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            rewards: LoyaltyRewardRepository::new(pool),
        }
    }

    /// Balance, coupons and the rewards on offer.
    ///
    /// # Errors
    ///
    /// Returns `LoyaltyError::UserNotFound` if the account was deleted.
    pub async fn summary(
        &self,
        user_id: UserId,
        config: LoyaltyConfig,
    ) -> Result<LoyaltySummary, LoyaltyError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(LoyaltyError::UserNotFound)?;
        let rewards = self.rewards.list(false).await?;
        Ok(LoyaltySummary {
            points: user.loyalty_points,
            coupons: user.loyalty_coupons,
            rewards,
            config,
        })
    }

    /// Spend points on a reward and hand back the coupon it produced.
    ///
    /// The balance check and the decrement are one conditional update, so
    /// two concurrent redemptions cannot overdraw the balance.
    ///
    /// # Errors
    ///
    /// Returns `LoyaltyError::InsufficientPoints` when the balance is short.
    #[tracing::instrument(skip(self, config))]
    pub async fn redeem(
        &self,
        user_id: UserId,
        reward_id: LoyaltyRewardId,
        config: &LoyaltyConfig,
    ) -> Result<(User, LoyaltyCoupon), LoyaltyError> {
        if !config.enabled {
            return Err(LoyaltyError::Disabled);
        }
        let reward = self
            .rewards
            .get(reward_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or(LoyaltyError::RewardNotFound)?;

        let coupon = coupon_for(&reward);
        if let Some(user) = self
            .users
            .redeem_points(user_id, reward.points_cost, &coupon)
            .await?
        {
            tracing::info!(code = %coupon.code, cost = reward.points_cost, "Reward redeemed");
            return Ok((user, coupon));
        }

        let balance = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(LoyaltyError::UserNotFound)?
            .loyalty_points;
        Err(LoyaltyError::InsufficientPoints {
            cost: reward.points_cost,
            balance,
        })
    }

    /// Admin adjustment of a balance by `delta` points.
    ///
    /// # Errors
    ///
    /// Returns `LoyaltyError::InsufficientPoints` when the adjustment would
    /// leave a negative balance.
    pub async fn adjust(&self, user_id: UserId, delta: i64) -> Result<User, LoyaltyError> {
        if let Some(user) = self.users.adjust_points(user_id, delta).await? {
            tracing::info!(%user_id, delta, balance = user.loyalty_points, "Points adjusted");
            return Ok(user);
        }
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(LoyaltyError::UserNotFound)?;
        Err(LoyaltyError::InsufficientPoints {
            cost: delta.saturating_neg(),
            balance: user.loyalty_points,
        })
    }
}
