//! Orders and their nested documents.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use canopy_core::{DiscountType, InvalidStatus, OrderId, OrderStatus, ProductId, UserId};

use super::{ValidationError, require_text};

/// How an order leaves the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
    Pickup,
}

impl ShippingMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Express => "express",
            Self::Pickup => "pickup",
        }
    }
}

impl fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShippingMethod {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            "pickup" => Ok(Self::Pickup),
            _ => Err(InvalidStatus {
                kind: "shipping method",
                value: s.to_owned(),
            }),
        }
    }
}

/// One order line with the price captured at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub variant: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

fn default_country() -> String {
    "CA".to_owned()
}

impl ShippingAddress {
    /// # Errors
    ///
    /// Returns `ValidationError` naming the first missing field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("shipping_address.full_name", &self.full_name)?;
        require_text("shipping_address.line1", &self.line1)?;
        require_text("shipping_address.city", &self.city)?;
        require_text("shipping_address.province", &self.province)?;
        require_text("shipping_address.postal_code", &self.postal_code)?;
        require_text("shipping_address.country", &self.country)
    }
}

/// Coupon applied to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// Amount actually taken off.
    pub amount: Decimal,
}

/// A fulfilment update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub invoice_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub shipping_method: ShippingMethod,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub coupon: Option<AppliedCoupon>,
    pub payment_method: String,
    pub loyalty_points: i64,
    pub loyalty_points_awarded: bool,
    pub tracking: Vec<TrackingEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Format a sequence value as an invoice number, e.g. `INV-001042`.
#[must_use]
pub fn format_invoice_number(seq: i64) -> String {
    format!("INV-{seq:06}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_number_format() {
        assert_eq!(format_invoice_number(123), "INV-000123");
        assert_eq!(format_invoice_number(1_234_567), "INV-1234567");
    }

    #[test]
    fn test_shipping_method_round_trip() {
        for method in [
            ShippingMethod::Standard,
            ShippingMethod::Express,
            ShippingMethod::Pickup,
        ] {
            assert_eq!(method.as_str().parse::<ShippingMethod>().unwrap(), method);
        }
        assert!("drone".parse::<ShippingMethod>().is_err());
    }

    #[test]
    fn test_address_requires_fields() {
        let address: ShippingAddress = serde_json::from_str(
            r#"{"full_name": "Sam Lee", "line1": "1 Main St", "city": "Toronto",
                "province": "ON", "postal_code": "M5V 1A1"}"#,
        )
        .unwrap();
        assert!(address.validate().is_ok());
        assert_eq!(address.country, "CA");

        let missing = ShippingAddress {
            city: String::new(),
            ..address
        };
        assert_eq!(
            missing.validate().unwrap_err().to_string(),
            "shipping_address.city is required"
        );
    }
}
