//! Referral repository.
//!
//! Status changes are guarded by `status = 'pending'` so a referral is
//! awarded or cancelled at most once.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use canopy_core::{OrderId, ReferralId, UserId};

use super::{Listing, RepositoryError};
use crate::models::{Paging, Referral};

const REFERRAL_COLUMNS: &str =
    "id, referrer_id, referred_id, order_id, status, points_awarded, created_at, updated_at";

#[derive(FromRow)]
struct ReferralRow {
    id: ReferralId,
    referrer_id: UserId,
    referred_id: UserId,
    order_id: Option<OrderId>,
    status: String,
    points_awarded: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReferralRow> for Referral {
    type Error = RepositoryError;

    fn try_from(row: ReferralRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            referrer_id: row.referrer_id,
            referred_id: row.referred_id,
            order_id: row.order_id,
            status: row
                .status
                .parse()
                .map_err(|e| RepositoryError::corrupt("referral status", e))?,
            points_awarded: row.points_awarded,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn collect(rows: Vec<ReferralRow>) -> Result<Vec<Referral>, RepositoryError> {
    rows.into_iter().map(Referral::try_from).collect()
}

pub struct ReferralRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReferralRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record that `referrer` brought in `referred`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if `referred` was already referred.
    pub async fn create(
        &self,
        referrer: UserId,
        referred: UserId,
    ) -> Result<Referral, RepositoryError> {
        let row: ReferralRow = sqlx::query_as(&format!(
            r"
            INSERT INTO referrals (referrer_id, referred_id)
            VALUES ($1, $2)
            RETURNING {REFERRAL_COLUMNS}
            "
        ))
        .bind(referrer)
        .bind(referred)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "This account was already referred"))?;
        row.try_into()
    }

    /// Referrals made by `referrer`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_referrer(&self, referrer: UserId) -> Result<Vec<Referral>, RepositoryError> {
        let rows: Vec<ReferralRow> = sqlx::query_as(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referrer_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(referrer)
        .fetch_all(self.pool)
        .await?;
        collect(rows)
    }

    /// Every referral, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, paging: Paging) -> Result<Listing<Referral>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM referrals")
            .fetch_one(self.pool)
            .await?;
        let rows: Vec<ReferralRow> = sqlx::query_as(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(paging.limit()))
        .bind(paging.offset())
        .fetch_all(self.pool)
        .await?;
        Ok(Listing {
            items: collect(rows)?,
            total,
        })
    }

    /// Award a pending referral for `referred` and credit both parties.
    ///
    /// The status flip and both point credits commit together. Returns
    /// `None` when there is no pending referral.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn award(
        &self,
        referred: UserId,
        order: OrderId,
        referrer_points: i64,
        referred_points: i64,
    ) -> Result<Option<Referral>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<ReferralRow> = sqlx::query_as(&format!(
            r"
            UPDATE referrals
            SET status = 'awarded', order_id = $2, points_awarded = $3, updated_at = NOW()
            WHERE referred_id = $1 AND status = 'pending'
            RETURNING {REFERRAL_COLUMNS}
            "
        ))
        .bind(referred)
        .bind(order)
        .bind(referrer_points)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        for (user, points) in [(row.referrer_id, referrer_points), (row.referred_id, referred_points)] {
            if points > 0 {
                sqlx::query(
                    "UPDATE users SET loyalty_points = loyalty_points + $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(user)
                .bind(points)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        row.try_into().map(Some)
    }

    /// Cancel the pending referral tied to `order`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cancel_for_order(&self, order: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE referrals SET status = 'cancelled', updated_at = NOW()
            WHERE order_id = $1 AND status = 'pending'
            ",
        )
        .bind(order)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
