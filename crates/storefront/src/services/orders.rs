//! Order fulfilment side effects.
//!
//! A status change may pay out points: delivery credits the order's loyalty
//! points and settles the customer's pending referral. Cancellation puts
//! stock back (inside the repository transaction) and cancels the referral
//! tied to the order. Every payout is a guarded update, so replaying a
//! status never pays twice.

use sqlx::PgPool;

use canopy_core::{OrderId, OrderStatus};

use crate::db::orders::TrackingUpdate;
use crate::db::{OrderRepository, ReferralRepository, RepositoryError};
use crate::models::{LoyaltyConfig, Order};

pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
    referrals: ReferralRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            referrals: ReferralRepository::new(pool),
        }
    }

    /// Change an order's status and apply its side effects.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown order and
    /// `RepositoryError::Conflict` when reopening a cancelled one.
    #[tracing::instrument(skip(self, update, loyalty))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        update: &TrackingUpdate,
        loyalty: &LoyaltyConfig,
    ) -> Result<Order, RepositoryError> {
        let change = self.orders.update_status(id, status, update).await?;
        let order = change.order;

        match status {
            OrderStatus::Delivered => {
                if self.orders.award_loyalty_points(order.id).await? {
                    tracing::info!(points = order.loyalty_points, "Loyalty points credited");
                }
                if loyalty.enabled
                    && let Some(referral) = self
                        .referrals
                        .award(
                            order.user_id,
                            order.id,
                            loyalty.referral_reward_points,
                            loyalty.referred_reward_points,
                        )
                        .await?
                {
                    tracing::info!(
                        referral_id = %referral.id,
                        referrer_id = %referral.referrer_id,
                        "Referral awarded"
                    );
                }
            }
            OrderStatus::Cancelled if change.previous != OrderStatus::Cancelled => {
                if self.referrals.cancel_for_order(order.id).await? {
                    tracing::info!("Referral cancelled with its order");
                }
            }
            _ => {}
        }

        // Re-read so the response shows the awarded flag.
        Ok(self.orders.get(order.id).await?.unwrap_or(order))
    }
}
