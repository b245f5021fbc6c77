//! Referral records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use canopy_core::{OrderId, ReferralId, ReferralStatus, UserId};

/// One referred signup.
#[derive(Debug, Clone, Serialize)]
pub struct Referral {
    pub id: ReferralId,
    pub referrer_id: UserId,
    pub referred_id: UserId,
    pub order_id: Option<OrderId>,
    pub status: ReferralStatus,
    pub points_awarded: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
