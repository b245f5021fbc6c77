//! Price and inventory normalization.
//!
//! Discount percentage and stock status are derived on every read and
//! never persisted, so they cannot drift from `price`, `original_price`
//! and the inventory counters they are computed from.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Inventory counters for a product or a single variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    /// Units on hand.
    pub quantity: i32,
    /// When false, quantity is informational and the item never sells out.
    pub track_inventory: bool,
    /// At or below this many units the item is reported as low stock.
    pub low_stock_threshold: i32,
    /// Stock keeping unit.
    pub sku: Option<String>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            quantity: 0,
            track_inventory: true,
            low_stock_threshold: 5,
            sku: None,
        }
    }
}

impl Inventory {
    /// Whether `requested` units can be sold right now.
    #[must_use]
    pub fn can_fulfill(&self, requested: i32) -> bool {
        !self.track_inventory || self.quantity >= requested
    }
}

/// Availability bucket shown next to a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
        }
    }
}

/// Percentage saved relative to `original_price`, rounded to a whole number.
///
/// Zero unless `original_price` is present, positive and strictly greater
/// than `price`. Halves round up (`12.5` → `13`).
#[must_use]
pub fn discount_percentage(price: Decimal, original_price: Option<Decimal>) -> u32 {
    let Some(original) = original_price else {
        return 0;
    };
    if original <= Decimal::ZERO || original <= price {
        return 0;
    }

    let percent = (original - price) / original * Decimal::ONE_HUNDRED;
    let rounded = percent
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0);

    // A discount this small can round to zero; it is still a discount.
    rounded.max(1)
}

/// Classify inventory into a [`StockStatus`].
#[must_use]
pub const fn stock_status(inventory: &Inventory) -> StockStatus {
    if !inventory.track_inventory {
        return StockStatus::InStock;
    }
    if inventory.quantity <= 0 {
        StockStatus::OutOfStock
    } else if inventory.quantity <= inventory.low_stock_threshold {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// Lowest and highest effective price across a product and its variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceRange {
    /// Build a range from the base price and any variant price overrides.
    ///
    /// A variant without its own price sells at `base`.
    #[must_use]
    pub fn from_prices(base: Decimal, variant_prices: impl IntoIterator<Item = Option<Decimal>>) -> Self {
        let mut range = Self {
            min: base,
            max: base,
        };
        let mut saw_variant = false;

        for price in variant_prices {
            let price = price.unwrap_or(base);
            if saw_variant {
                range.min = range.min.min(price);
                range.max = range.max.max(price);
            } else {
                range = Self {
                    min: price,
                    max: price,
                };
                saw_variant = true;
            }
        }

        range
    }

    /// Whether every option sells at the same price.
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.min == self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn test_twenty_percent_off() {
        assert_eq!(discount_percentage(dec(80), Some(dec(100))), 20);
    }

    #[test]
    fn test_rounds_half_up() {
        // 7 / 56 = 12.5%
        assert_eq!(discount_percentage(dec(49), Some(dec(56))), 13);
        // 1 / 3 = 33.33%
        assert_eq!(discount_percentage(dec(2), Some(dec(3))), 33);
    }

    #[test]
    fn test_no_discount_without_higher_original() {
        assert_eq!(discount_percentage(dec(80), None), 0);
        assert_eq!(discount_percentage(dec(80), Some(dec(80))), 0);
        assert_eq!(discount_percentage(dec(80), Some(dec(60))), 0);
        assert_eq!(discount_percentage(dec(0), Some(dec(0))), 0);
    }

    #[test]
    fn test_discount_positive_iff_original_greater() {
        let cases = [
            (Decimal::new(1999, 2), Some(Decimal::new(2000, 2))),
            (Decimal::new(99_999, 2), Some(Decimal::new(100_000, 2))),
            (dec(10), Some(dec(10))),
            (dec(10), Some(dec(11))),
            (dec(10), Some(dec(9))),
            (dec(0), Some(dec(5))),
            (dec(5), None),
        ];
        for (price, original) in cases {
            let positive = discount_percentage(price, original) > 0;
            let higher = original.is_some_and(|o| o > price);
            assert_eq!(positive, higher, "price {price} original {original:?}");
        }
    }

    #[test]
    fn test_out_of_stock_when_tracked_and_empty() {
        let inventory = Inventory {
            quantity: 0,
            track_inventory: true,
            ..Inventory::default()
        };
        assert_eq!(stock_status(&inventory), StockStatus::OutOfStock);
    }

    #[test]
    fn test_low_stock_at_threshold() {
        let inventory = Inventory {
            quantity: 5,
            low_stock_threshold: 5,
            ..Inventory::default()
        };
        assert_eq!(stock_status(&inventory), StockStatus::LowStock);

        let plenty = Inventory {
            quantity: 6,
            ..inventory
        };
        assert_eq!(stock_status(&plenty), StockStatus::InStock);
    }

    #[test]
    fn test_untracked_always_in_stock() {
        for quantity in [-3, 0, 1, 5, 500] {
            let inventory = Inventory {
                quantity,
                track_inventory: false,
                ..Inventory::default()
            };
            assert_eq!(stock_status(&inventory), StockStatus::InStock);
            assert!(inventory.can_fulfill(1_000));
        }
    }

    #[test]
    fn test_can_fulfill_tracked() {
        let inventory = Inventory {
            quantity: 3,
            ..Inventory::default()
        };
        assert!(inventory.can_fulfill(3));
        assert!(!inventory.can_fulfill(4));
    }

    #[test]
    fn test_price_range_inherits_base_price() {
        let range = PriceRange::from_prices(dec(30), [Some(dec(25)), None, Some(dec(45))]);
        assert_eq!(range.min, dec(25));
        assert_eq!(range.max, dec(45));

        let single = PriceRange::from_prices(dec(30), []);
        assert!(single.is_single());
    }

    #[test]
    fn test_inventory_defaults_from_partial_json() {
        let inventory: Inventory = serde_json::from_str(r#"{"quantity": 12}"#).unwrap_or_default();
        assert_eq!(inventory.quantity, 12);
        assert!(inventory.track_inventory);
        assert_eq!(inventory.low_stock_threshold, 5);
    }
}
