//! Cart pricing and order placement.
//!
//! [`price_cart`] is pure: it turns cart lines, the products they name and
//! the current settings into a [`Quote`]. [`CheckoutService::place`] prices
//! the cart the same way and hands the result to the order repository,
//! which re-checks stock under row locks before writing.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use canopy_core::ProductId;

use crate::db::orders::NewOrder;
use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::models::order::AppliedCoupon;
use crate::models::{
    LoyaltyConfig, LoyaltyCoupon, Order, OrderItem, PaymentSettings, Product, ShippingAddress,
    ShippingMethod, ShippingSettings, User, ValidationError,
};

/// Most distinct lines accepted in one cart.
const MAX_LINES: usize = 100;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart has too many lines (max {MAX_LINES})")]
    TooManyLines,

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error("{product} has no option {variant}")]
    UnknownVariant { product: String, variant: String },

    #[error("Insufficient inventory for {0}")]
    InsufficientStock(String),

    #[error("{0} shipping is not available")]
    ShippingUnavailable(ShippingMethod),

    #[error("Coupon is invalid or already used")]
    InvalidCoupon,

    #[error("Payment method is not accepted")]
    PaymentMethodUnavailable,

    #[error("{0}")]
    Invalid(#[from] ValidationError),

    /// The order could not be written as priced, e.g. stock ran out.
    #[error("{0}")]
    Rejected(String),

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl CheckoutError {
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Repository(_))
    }
}

impl From<RepositoryError> for CheckoutError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => Self::Rejected(message),
            other => Self::Repository(other),
        }
    }
}

/// One cart line as sent by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant: Option<String>,
    pub quantity: i32,
}

/// Body of the quote and place-order requests.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub shipping_method: ShippingMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl CheckoutRequest {
    fn coupon_code(&self) -> Option<&str> {
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// A priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub items: Vec<OrderItem>,
    pub shipping_method: ShippingMethod,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub coupon: Option<AppliedCoupon>,
    /// Points the order earns once delivered.
    pub loyalty_points: i64,
}

/// Price `lines` against `products`.
///
/// # Errors
///
/// Returns a client-facing `CheckoutError` for anything that makes the cart
/// unpurchasable.
pub fn price_cart(
    lines: &[CartLine],
    products: &HashMap<ProductId, Product>,
    coupon: Option<&LoyaltyCoupon>,
    method: ShippingMethod,
    shipping: &ShippingSettings,
    loyalty: &LoyaltyConfig,
) -> Result<Quote, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    if lines.len() > MAX_LINES {
        return Err(CheckoutError::TooManyLines);
    }

    // Stock is checked against the combined quantity of lines that draw on
    // the same counter.
    let mut requested: HashMap<(ProductId, Option<usize>), i32> = HashMap::new();
    let mut items = Vec::with_capacity(lines.len());

    for line in lines {
        if line.quantity < 1 {
            return Err(CheckoutError::InvalidQuantity);
        }
        let product = products
            .get(&line.product_id)
            .filter(|p| p.is_active)
            .ok_or(CheckoutError::ProductUnavailable(line.product_id))?;

        let label = line
            .variant
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let (variant_idx, unit_price, inventory, variant_label) = match label {
            Some(label) => {
                let (idx, variant) = product
                    .variants
                    .iter()
                    .enumerate()
                    .find(|(_, v)| v.matches(label))
                    .ok_or_else(|| CheckoutError::UnknownVariant {
                        product: product.name.clone(),
                        variant: label.to_owned(),
                    })?;
                (
                    Some(idx),
                    variant.effective_price(product.price),
                    &variant.inventory,
                    Some(variant.value.clone()),
                )
            }
            None => (None, product.price, &product.inventory, None),
        };

        let total_requested = requested
            .entry((product.id, variant_idx))
            .or_insert(0);
        *total_requested = total_requested.saturating_add(line.quantity);
        if !inventory.can_fulfill(*total_requested) {
            return Err(CheckoutError::InsufficientStock(product.name.clone()));
        }

        items.push(OrderItem {
            product_id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            variant: variant_label,
            quantity: line.quantity,
            unit_price,
            line_total: unit_price * Decimal::from(line.quantity),
            image: product.primary_image(),
        });
    }

    let subtotal: Decimal = items.iter().map(|i| i.line_total).sum();

    let applied = coupon.map(|c| AppliedCoupon {
        code: c.code.clone(),
        discount_type: c.discount_type,
        discount_value: c.discount_value,
        amount: c.discount_on(subtotal),
    });
    let discount = applied.as_ref().map_or(Decimal::ZERO, |c| c.amount);

    let shipping_cost = shipping_cost(method, subtotal - discount, shipping)?;
    let total = subtotal - discount + shipping_cost;

    Ok(Quote {
        items,
        shipping_method: method,
        subtotal,
        discount,
        shipping: shipping_cost,
        total,
        coupon: applied,
        loyalty_points: points_for(total, loyalty),
    })
}

/// Shipping charge for `method` on a discounted subtotal.
///
/// # Errors
///
/// Returns `CheckoutError::ShippingUnavailable` for a disabled method.
pub fn shipping_cost(
    method: ShippingMethod,
    discounted_subtotal: Decimal,
    settings: &ShippingSettings,
) -> Result<Decimal, CheckoutError> {
    match method {
        ShippingMethod::Pickup if settings.pickup_enabled => Ok(Decimal::ZERO),
        ShippingMethod::Express if settings.express_enabled => Ok(settings.express_rate),
        ShippingMethod::Standard => Ok(match settings.free_shipping_threshold {
            Some(threshold) if discounted_subtotal >= threshold => Decimal::ZERO,
            _ => settings.flat_rate,
        }),
        ShippingMethod::Pickup | ShippingMethod::Express => {
            Err(CheckoutError::ShippingUnavailable(method))
        }
    }
}

/// Whole points earned on `total`.
#[must_use]
pub fn points_for(total: Decimal, loyalty: &LoyaltyConfig) -> i64 {
    if !loyalty.enabled {
        return 0;
    }
    (total * loyalty.points_per_dollar)
        .floor()
        .to_i64()
        .unwrap_or(0)
        .max(0)
}

pub struct CheckoutService<'a> {
    products: ProductRepository<'a>,
    orders: OrderRepository<'a>,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            products: ProductRepository::new(pool),
            orders: OrderRepository::new(pool),
        }
    }

    /// Price a cart without writing anything.
    ///
    /// A coupon needs a signed-in customer who holds it.
    ///
    /// # Errors
    ///
    /// See [`price_cart`].
    pub async fn quote(
        &self,
        request: &CheckoutRequest,
        user: Option<&User>,
        shipping: &ShippingSettings,
        loyalty: &LoyaltyConfig,
    ) -> Result<Quote, CheckoutError> {
        let coupon = match request.coupon_code() {
            Some(code) => Some(
                user.and_then(|u| u.unused_coupon(code))
                    .ok_or(CheckoutError::InvalidCoupon)?,
            ),
            None => None,
        };
        let products = self.load_products(&request.items).await?;
        price_cart(
            &request.items,
            &products,
            coupon,
            request.shipping_method,
            shipping,
            loyalty,
        )
    }

    /// Price and place an order for `user`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Invalid` for a missing or incomplete address.
    /// Returns `CheckoutError::PaymentMethodUnavailable` for a method the
    /// store does not accept. Returns `CheckoutError::Rejected` when stock
    /// or the coupon was taken between pricing and writing.
    #[tracing::instrument(skip_all, fields(user_id = %user.id))]
    pub async fn place(
        &self,
        request: &CheckoutRequest,
        user: &User,
        shipping: &ShippingSettings,
        payment: &PaymentSettings,
        loyalty: &LoyaltyConfig,
    ) -> Result<Order, CheckoutError> {
        let address = request
            .shipping_address
            .clone()
            .ok_or_else(|| ValidationError::new("shipping_address is required"))?;
        address.validate()?;

        let payment_method = request
            .payment_method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ValidationError::new("payment_method is required"))?;
        if !payment.accepts(payment_method) {
            return Err(CheckoutError::PaymentMethodUnavailable);
        }

        let quote = self.quote(request, Some(user), shipping, loyalty).await?;

        let order = self
            .orders
            .place(&NewOrder {
                user_id: user.id,
                items: quote.items,
                shipping_address: address,
                shipping_method: quote.shipping_method,
                subtotal: quote.subtotal,
                discount: quote.discount,
                shipping: quote.shipping,
                total: quote.total,
                coupon: quote.coupon,
                payment_method: payment_method.to_owned(),
                loyalty_points: quote.loyalty_points,
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            invoice = %order.invoice_number,
            total = %order.total,
            "Order placed"
        );
        Ok(order)
    }

    async fn load_products(
        &self,
        lines: &[CartLine],
    ) -> Result<HashMap<ProductId, Product>, CheckoutError> {
        let mut ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let products = self.products.get_many(&ids).await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use canopy_core::{DiscountType, Inventory};

    use super::*;
    use crate::models::product::{Badges, Variant};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn product(id: i64, price: &str, quantity: i32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: String::new(),
            price: dec(price),
            original_price: None,
            images: vec![],
            category_id: None,
            category_ids: vec![],
            inventory: Inventory {
                quantity,
                ..Inventory::default()
            },
            variants: vec![],
            badges: Badges::default(),
            is_active: true,
            is_featured: false,
            average_rating: Decimal::ZERO,
            review_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<ProductId, Product> {
        products.into_iter().map(|p| (p.id, p)).collect()
    }

    fn line(id: i64, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            variant: None,
            quantity,
        }
    }

    fn coupon(kind: DiscountType, value: &str) -> LoyaltyCoupon {
        LoyaltyCoupon {
            code: "LOYAL-ABC123".to_owned(),
            reward_name: "Reward".to_owned(),
            discount_type: kind,
            discount_value: dec(value),
            used: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_standard_shipping_below_threshold() {
        let products = catalog(vec![product(1, "20.00", 10)]);
        let quote = price_cart(
            &[line(1, 2)],
            &products,
            None,
            ShippingMethod::Standard,
            &ShippingSettings::default(),
            &LoyaltyConfig::default(),
        )
        .unwrap();

        assert_eq!(quote.subtotal, dec("40.00"));
        assert_eq!(quote.shipping, dec("9.99"));
        assert_eq!(quote.total, dec("49.99"));
        assert_eq!(quote.loyalty_points, 49);
    }

    #[test]
    fn test_free_shipping_uses_discounted_subtotal() {
        let products = catalog(vec![product(1, "40.00", 10)]);
        let settings = ShippingSettings::default();

        let full = price_cart(
            &[line(1, 2)],
            &products,
            None,
            ShippingMethod::Standard,
            &settings,
            &LoyaltyConfig::default(),
        )
        .unwrap();
        assert_eq!(full.shipping, Decimal::ZERO);

        let fixed = coupon(DiscountType::Fixed, "10");
        let discounted = price_cart(
            &[line(1, 2)],
            &products,
            Some(&fixed),
            ShippingMethod::Standard,
            &settings,
            &LoyaltyConfig::default(),
        )
        .unwrap();
        assert_eq!(discounted.discount, dec("10"));
        assert_eq!(discounted.shipping, dec("9.99"));
        assert_eq!(discounted.total, dec("79.99"));
    }

    #[test]
    fn test_percentage_coupon_and_pickup() {
        let products = catalog(vec![product(1, "25.00", 10)]);
        let pct = coupon(DiscountType::Percentage, "10");
        let quote = price_cart(
            &[line(1, 1)],
            &products,
            Some(&pct),
            ShippingMethod::Pickup,
            &ShippingSettings::default(),
            &LoyaltyConfig::default(),
        )
        .unwrap();
        assert_eq!(quote.discount, dec("2.50"));
        assert_eq!(quote.shipping, Decimal::ZERO);
        assert_eq!(quote.total, dec("22.50"));
        assert_eq!(quote.coupon.unwrap().code, "LOYAL-ABC123");
    }

    #[test]
    fn test_disabled_express_is_rejected() {
        let settings = ShippingSettings {
            express_enabled: false,
            ..ShippingSettings::default()
        };
        let err = shipping_cost(ShippingMethod::Express, dec("10"), &settings).unwrap_err();
        assert_eq!(err.to_string(), "express shipping is not available");
    }

    #[test]
    fn test_variant_price_and_stock() {
        let mut p = product(1, "30.00", 0);
        p.variants.push(Variant {
            name: "Size".to_owned(),
            value: "7g".to_owned(),
            price: Some(dec("55.00")),
            original_price: None,
            inventory: Inventory {
                quantity: 3,
                ..Inventory::default()
            },
            sku: None,
        });
        let products = catalog(vec![p]);
        let variant_line = CartLine {
            variant: Some("7g".to_owned()),
            ..line(1, 2)
        };

        let quote = price_cart(
            std::slice::from_ref(&variant_line),
            &products,
            None,
            ShippingMethod::Pickup,
            &ShippingSettings::default(),
            &LoyaltyConfig::default(),
        )
        .unwrap();
        assert_eq!(quote.items[0].unit_price, dec("55.00"));
        assert_eq!(quote.items[0].variant.as_deref(), Some("7g"));

        // Two lines on the same variant draw on one counter.
        let err = price_cart(
            &[variant_line.clone(), variant_line],
            &products,
            None,
            ShippingMethod::Pickup,
            &ShippingSettings::default(),
            &LoyaltyConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CheckoutError::InsufficientStock(_)));

        let unknown = CartLine {
            variant: Some("28g".to_owned()),
            ..line(1, 1)
        };
        assert!(matches!(
            price_cart(
                &[unknown],
                &products,
                None,
                ShippingMethod::Pickup,
                &ShippingSettings::default(),
                &LoyaltyConfig::default(),
            ),
            Err(CheckoutError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_lines() {
        let mut inactive = product(2, "5.00", 10);
        inactive.is_active = false;
        let products = catalog(vec![product(1, "5.00", 10), inactive]);
        let price = |lines: &[CartLine]| {
            price_cart(
                lines,
                &products,
                None,
                ShippingMethod::Standard,
                &ShippingSettings::default(),
                &LoyaltyConfig::default(),
            )
        };

        assert!(matches!(price(&[]), Err(CheckoutError::EmptyCart)));
        assert!(matches!(price(&[line(1, 0)]), Err(CheckoutError::InvalidQuantity)));
        assert!(matches!(
            price(&[line(2, 1)]),
            Err(CheckoutError::ProductUnavailable(_))
        ));
        assert!(matches!(
            price(&[line(9, 1)]),
            Err(CheckoutError::ProductUnavailable(_))
        ));
        assert!(matches!(
            price(&[line(1, 11)]),
            Err(CheckoutError::InsufficientStock(_))
        ));
    }

    #[test]
    fn test_points_follow_loyalty_config() {
        let mut config = LoyaltyConfig::default();
        assert_eq!(points_for(dec("49.99"), &config), 49);
        config.points_per_dollar = dec("2");
        assert_eq!(points_for(dec("10.50"), &config), 21);
        config.enabled = false;
        assert_eq!(points_for(dec("100"), &config), 0);
    }

    #[test]
    fn test_conflicts_become_client_errors() {
        let err = CheckoutError::from(RepositoryError::Conflict(
            "Insufficient inventory for Blue Dream".into(),
        ));
        assert!(!err.is_server_error());
        assert_eq!(err.to_string(), "Insufficient inventory for Blue Dream");
        assert!(CheckoutError::from(RepositoryError::NotFound).is_server_error());
    }
}
