//! Loyalty reward repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use canopy_core::LoyaltyRewardId;

use super::RepositoryError;
use crate::models::{LoyaltyReward, LoyaltyRewardInput};

const REWARD_COLUMNS: &str = "id, name, description, points_cost, discount_type, discount_value, \
     is_active, created_at, updated_at";

#[derive(FromRow)]
struct RewardRow {
    id: LoyaltyRewardId,
    name: String,
    description: Option<String>,
    points_cost: i64,
    discount_type: String,
    discount_value: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RewardRow> for LoyaltyReward {
    type Error = RepositoryError;

    fn try_from(row: RewardRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            points_cost: row.points_cost,
            discount_type: row
                .discount_type
                .parse()
                .map_err(|e| RepositoryError::corrupt("discount type", e))?,
            discount_value: row.discount_value,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct LoyaltyRewardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LoyaltyRewardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Rewards by cost, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<LoyaltyReward>, RepositoryError> {
        let rows: Vec<RewardRow> = sqlx::query_as(&format!(
            "SELECT {REWARD_COLUMNS} FROM loyalty_rewards WHERE is_active OR $1 ORDER BY points_cost, id"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(LoyaltyReward::try_from).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: LoyaltyRewardId) -> Result<Option<LoyaltyReward>, RepositoryError> {
        let row: Option<RewardRow> = sqlx::query_as(&format!(
            "SELECT {REWARD_COLUMNS} FROM loyalty_rewards WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(LoyaltyReward::try_from).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, input: &LoyaltyRewardInput) -> Result<LoyaltyReward, RepositoryError> {
        let row: RewardRow = sqlx::query_as(&format!(
            r"
            INSERT INTO loyalty_rewards (name, description, points_cost, discount_type, discount_value, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REWARD_COLUMNS}
            "
        ))
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .bind(input.points_cost)
        .bind(input.discount_type.as_str())
        .bind(input.discount_value)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the reward does not exist.
    pub async fn update(
        &self,
        id: LoyaltyRewardId,
        input: &LoyaltyRewardInput,
    ) -> Result<LoyaltyReward, RepositoryError> {
        let row: Option<RewardRow> = sqlx::query_as(&format!(
            r"
            UPDATE loyalty_rewards SET
                name = $2, description = $3, points_cost = $4, discount_type = $5,
                discount_value = $6, is_active = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {REWARD_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .bind(input.points_cost)
        .bind(input.discount_type.as_str())
        .bind(input.discount_value)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?;
        row.map(LoyaltyReward::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: LoyaltyRewardId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM loyalty_rewards WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
