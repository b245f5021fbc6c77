//! User domain types.
//!
//! `User` never carries the password hash; the repository returns it
//! separately for the one place that needs it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use canopy_core::{Email, UserId, UserRole};

use super::LoyaltyCoupon;

/// A Canopy account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub loyalty_points: i64,
    pub loyalty_coupons: Vec<LoyaltyCoupon>,
    pub referral_code: Option<String>,
    pub referred_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Unused coupon with `code`, compared case-insensitively.
    #[must_use]
    pub fn unused_coupon(&self, code: &str) -> Option<&LoyaltyCoupon> {
        let code = code.trim();
        self.loyalty_coupons
            .iter()
            .find(|c| !c.used && c.code.eq_ignore_ascii_case(code))
    }
}
