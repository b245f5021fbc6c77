//! Loyalty rewards and the coupons they turn into.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use canopy_core::{DiscountType, LoyaltyRewardId};

use super::{ValidationError, require_text};

/// Something a customer can buy with points.
#[derive(Debug, Clone, Serialize)]
pub struct LoyaltyReward {
    pub id: LoyaltyRewardId,
    pub name: String,
    pub description: Option<String>,
    pub points_cost: i64,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A redeemed reward held on the user until used at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyCoupon {
    pub code: String,
    pub reward_name: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl LoyaltyCoupon {
    /// Amount taken off `subtotal`, never more than the subtotal itself.
    #[must_use]
    pub fn discount_on(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                (subtotal * self.discount_value / Decimal::ONE_HUNDRED).round_dp(2)
            }
            DiscountType::Fixed => self.discount_value,
        };
        raw.clamp(Decimal::ZERO, subtotal)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoyaltyRewardInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub points_cost: i64,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl LoyaltyRewardInput {
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if self.points_cost <= 0 {
            return Err(ValidationError::new("points_cost must be positive"));
        }
        if self.discount_value <= Decimal::ZERO {
            return Err(ValidationError::new("discount_value must be positive"));
        }
        if self.discount_type == DiscountType::Percentage
            && self.discount_value > Decimal::ONE_HUNDRED
        {
            return Err(ValidationError::new(
                "percentage discount cannot exceed 100",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(discount_type: DiscountType, value: i64) -> LoyaltyCoupon {
        LoyaltyCoupon {
            code: "LOYAL-ABC123".into(),
            reward_name: "Reward".into(),
            discount_type,
            discount_value: Decimal::from(value),
            used: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_percentage_coupon() {
        let c = coupon(DiscountType::Percentage, 10);
        assert_eq!(c.discount_on(Decimal::new(4550, 2)), Decimal::new(455, 2));
    }

    #[test]
    fn test_fixed_coupon_capped_at_subtotal() {
        let c = coupon(DiscountType::Fixed, 25);
        assert_eq!(c.discount_on(Decimal::from(100)), Decimal::from(25));
        assert_eq!(c.discount_on(Decimal::from(15)), Decimal::from(15));
    }
}
