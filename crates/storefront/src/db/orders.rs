//! Order repository.
//!
//! Placing an order is the one multi-row write: invoice number, inventory,
//! order row, coupon and referral link commit in a single transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use canopy_core::{OrderId, OrderStatus, ProductId, UserId};

use super::products::{PRODUCT_SELECT, ProductRow};
use super::{Listing, RepositoryError};
use crate::models::order::{AppliedCoupon, format_invoice_number};
use crate::models::{
    Order, OrderItem, Paging, Product, ShippingAddress, ShippingMethod, TrackingEvent,
};

const ORDER_COLUMNS: &str = "id, invoice_number, user_id, items, shipping_address, shipping_method, \
     subtotal, discount, shipping, total, status, coupon, payment_method, loyalty_points, \
     loyalty_points_awarded, tracking, created_at, updated_at";

#[derive(FromRow)]
struct OrderRow {
    id: OrderId,
    invoice_number: String,
    user_id: UserId,
    items: Json<Vec<OrderItem>>,
    shipping_address: Json<ShippingAddress>,
    shipping_method: String,
    subtotal: Decimal,
    discount: Decimal,
    shipping: Decimal,
    total: Decimal,
    status: String,
    coupon: Option<Json<AppliedCoupon>>,
    payment_method: String,
    loyalty_points: i64,
    loyalty_points_awarded: bool,
    tracking: Json<Vec<TrackingEvent>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            invoice_number: row.invoice_number,
            user_id: row.user_id,
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            shipping_method: row
                .shipping_method
                .parse()
                .map_err(|e| RepositoryError::corrupt("shipping method", e))?,
            subtotal: row.subtotal,
            discount: row.discount,
            shipping: row.shipping,
            total: row.total,
            status: row
                .status
                .parse()
                .map_err(|e| RepositoryError::corrupt("order status", e))?,
            coupon: row.coupon.map(|c| c.0),
            payment_method: row.payment_method,
            loyalty_points: row.loyalty_points,
            loyalty_points_awarded: row.loyalty_points_awarded,
            tracking: row.tracking.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn collect(rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
    rows.into_iter().map(Order::try_from).collect()
}

/// A fully priced order ready to be written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub shipping_method: ShippingMethod,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub coupon: Option<AppliedCoupon>,
    pub payment_method: String,
    pub loyalty_points: i64,
}

/// Result of a status change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub order: Order,
    pub previous: OrderStatus,
}

/// Tracking details attached to a status change or a tracking update.
#[derive(Debug, Clone, Default)]
pub struct TrackingUpdate {
    pub note: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}

impl TrackingUpdate {
    fn event(&self, status: OrderStatus) -> TrackingEvent {
        TrackingEvent {
            status,
            note: self.note.clone(),
            carrier: self.carrier.clone(),
            tracking_number: self.tracking_number.clone(),
            created_at: Utc::now(),
        }
    }
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Write an order and everything it consumes.
    ///
    /// Product rows are locked while their inventory is re-checked, so two
    /// checkouts cannot both take the last unit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if stock ran out or the coupon
    /// was used since the order was priced.
    pub async fn place(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let seq: i64 = sqlx::query_scalar("SELECT nextval('invoice_number_seq')")
            .fetch_one(&mut *tx)
            .await?;
        let invoice_number = format_invoice_number(seq);

        adjust_inventory(&mut tx, &new.items, Direction::Take).await?;

        if let Some(coupon) = &new.coupon {
            mark_coupon_used(&mut tx, new.user_id, &coupon.code).await?;
        }

        let row: OrderRow = sqlx::query_as(&format!(
            r"
            INSERT INTO orders
                (invoice_number, user_id, items, shipping_address, shipping_method,
                 subtotal, discount, shipping, total, status, coupon, payment_method,
                 loyalty_points, tracking)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $11, $12, $13)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(&invoice_number)
        .bind(new.user_id)
        .bind(Json(&new.items))
        .bind(Json(&new.shipping_address))
        .bind(new.shipping_method.as_str())
        .bind(new.subtotal)
        .bind(new.discount)
        .bind(new.shipping)
        .bind(new.total)
        .bind(new.coupon.as_ref().map(Json))
        .bind(&new.payment_method)
        .bind(new.loyalty_points)
        .bind(Json(vec![TrackingUpdate::default().event(OrderStatus::Pending)]))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "Invoice number already issued"))?;

        sqlx::query(
            r"
            UPDATE referrals SET order_id = $2, updated_at = NOW()
            WHERE referred_id = $1 AND status = 'pending' AND order_id IS NULL
            ",
        )
        .bind(new.user_id)
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        row.map(Order::try_from).transpose()
    }

    /// Get an order only if it belongs to `user`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(self.pool)
        .await?;
        row.map(Order::try_from).transpose()
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user: UserId,
        paging: Paging,
    ) -> Result<Listing<Order>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user)
            .fetch_one(self.pool)
            .await?;
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1
            ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3
            "
        ))
        .bind(user)
        .bind(i64::from(paging.limit()))
        .bind(paging.offset())
        .fetch_all(self.pool)
        .await?;
        Ok(Listing {
            items: collect(rows)?,
            total,
        })
    }

    /// Every order, optionally narrowed to one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        paging: Paging,
    ) -> Result<Listing<Order>, RepositoryError> {
        let status = status.map(OrderStatus::as_str);
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)")
                .bind(status)
                .fetch_one(self.pool)
                .await?;
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(i64::from(paging.limit()))
        .bind(paging.offset())
        .fetch_all(self.pool)
        .await?;
        Ok(Listing {
            items: collect(rows)?,
            total,
        })
    }

    /// Move an order to `status` and record a tracking event.
    ///
    /// Cancelling puts tracked stock back. A cancelled order stays
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` when reopening a cancelled order.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        update: &TrackingUpdate,
    ) -> Result<StatusChange, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let previous: OrderStatus = current
            .ok_or(RepositoryError::NotFound)?
            .parse()
            .map_err(|e| RepositoryError::corrupt("order status", e))?;

        if previous == OrderStatus::Cancelled && status != OrderStatus::Cancelled {
            return Err(RepositoryError::Conflict(
                "Cancelled orders cannot be reopened".to_owned(),
            ));
        }

        let row: OrderRow = sqlx::query_as(&format!(
            r"
            UPDATE orders
            SET status = $2, tracking = tracking || jsonb_build_array($3::jsonb), updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(Json(update.event(status)))
        .fetch_one(&mut *tx)
        .await?;

        if status == OrderStatus::Cancelled && previous != OrderStatus::Cancelled {
            adjust_inventory(&mut tx, &row.items.0, Direction::Restore).await?;
        }

        tx.commit().await?;
        Ok(StatusChange {
            order: row.try_into()?,
            previous,
        })
    }

    /// Append a tracking event without changing the status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn add_tracking(
        &self,
        id: OrderId,
        update: &TrackingUpdate,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE orders
            SET tracking = tracking || jsonb_build_array(
                    jsonb_set($2::jsonb, '{{status}}', to_jsonb(status))),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(Json(update.event(OrderStatus::Pending)))
        .fetch_optional(self.pool)
        .await?;
        row.map(Order::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Credit the order's loyalty points to its customer, once.
    ///
    /// Returns `false` when the points were already credited.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn award_loyalty_points(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let claimed: Option<(UserId, i64)> = sqlx::query_as(
            r"
            UPDATE orders SET loyalty_points_awarded = TRUE, updated_at = NOW()
            WHERE id = $1 AND NOT loyalty_points_awarded
            RETURNING user_id, loyalty_points
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user, points)) = claimed else {
            return Ok(false);
        };

        if points > 0 {
            sqlx::query(
                "UPDATE users SET loyalty_points = loyalty_points + $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(user)
            .bind(points)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Take,
    Restore,
}

/// Apply order lines to the locked product rows.
async fn adjust_inventory(
    tx: &mut Transaction<'_, Postgres>,
    items: &[OrderItem],
    direction: Direction,
) -> Result<(), RepositoryError> {
    let ids: Vec<i64> = items.iter().map(|i| i.product_id.as_i64()).collect();
    let rows: Vec<ProductRow> = sqlx::query_as(&format!(
        "{PRODUCT_SELECT} WHERE p.id = ANY($1) ORDER BY p.id FOR UPDATE OF p"
    ))
    .bind(ids)
    .fetch_all(&mut **tx)
    .await?;

    let mut products: HashMap<ProductId, Product> = rows
        .into_iter()
        .map(Product::from)
        .map(|p| (p.id, p))
        .collect();

    for item in items {
        let Some(product) = products.get_mut(&item.product_id) else {
            if direction == Direction::Take {
                return Err(RepositoryError::Conflict(format!(
                    "{} is no longer available",
                    item.name
                )));
            }
            // Deleted since the order was placed.
            continue;
        };
        apply_line(product, item, direction)?;
    }

    for product in products.values() {
        sqlx::query(
            "UPDATE products SET inventory = $2, variants = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(product.id)
        .bind(Json(&product.inventory))
        .bind(Json(&product.variants))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Move one line's quantity in or out of the product or variant counter.
fn apply_line(
    product: &mut Product,
    item: &OrderItem,
    direction: Direction,
) -> Result<(), RepositoryError> {
    let name = product.name.clone();
    let inventory = match item.variant.as_deref() {
        Some(label) => match product.variants.iter_mut().find(|v| v.matches(label)) {
            Some(variant) => &mut variant.inventory,
            None if direction == Direction::Restore => return Ok(()),
            None => {
                return Err(RepositoryError::Conflict(format!(
                    "{name} no longer offers {label}"
                )));
            }
        },
        None => &mut product.inventory,
    };

    if !inventory.track_inventory {
        return Ok(());
    }
    match direction {
        Direction::Take => {
            if !inventory.can_fulfill(item.quantity) {
                return Err(RepositoryError::Conflict(format!(
                    "Insufficient inventory for {name}"
                )));
            }
            inventory.quantity -= item.quantity;
        }
        Direction::Restore => inventory.quantity += item.quantity,
    }
    Ok(())
}

/// Flip one unused coupon on the user to used.
async fn mark_coupon_used(
    tx: &mut Transaction<'_, Postgres>,
    user: UserId,
    code: &str,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE users SET
            loyalty_coupons = (
                SELECT COALESCE(jsonb_agg(
                    CASE WHEN c->>'code' = $2 THEN jsonb_set(c, '{used}', 'true'::jsonb) ELSE c END
                    ORDER BY ord), '[]'::jsonb)
                FROM jsonb_array_elements(loyalty_coupons) WITH ORDINALITY AS t(c, ord)
            ),
            updated_at = NOW()
        WHERE id = $1 AND EXISTS (
            SELECT 1 FROM jsonb_array_elements(loyalty_coupons) AS c
            WHERE c->>'code' = $2 AND NOT COALESCE((c->>'used')::boolean, FALSE)
        )
        ",
    )
    .bind(user)
    .bind(code)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(
            "Coupon is invalid or already used".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use canopy_core::Inventory;

    use super::*;
    use crate::models::product::{Badges, Variant};

    fn product(quantity: i32, variants: Vec<Variant>) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Blue Dream".to_owned(),
            slug: "blue-dream".to_owned(),
            description: String::new(),
            price: Decimal::from(30),
            original_price: None,
            images: vec![],
            category_id: None,
            category_ids: vec![],
            inventory: Inventory {
                quantity,
                ..Inventory::default()
            },
            variants,
            badges: Badges::default(),
            is_active: true,
            is_featured: false,
            average_rating: Decimal::ZERO,
            review_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(quantity: i32, variant: Option<&str>) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(1),
            name: "Blue Dream".to_owned(),
            slug: "blue-dream".to_owned(),
            variant: variant.map(str::to_owned),
            quantity,
            unit_price: Decimal::from(30),
            line_total: Decimal::from(30 * quantity),
            image: None,
        }
    }

    fn eighth(quantity: i32) -> Variant {
        Variant {
            name: "Size".to_owned(),
            value: "3.5g".to_owned(),
            price: Some(Decimal::from(35)),
            original_price: None,
            inventory: Inventory {
                quantity,
                ..Inventory::default()
            },
            sku: None,
        }
    }

    #[test]
    fn test_take_and_restore_product_stock() {
        let mut p = product(5, vec![]);
        apply_line(&mut p, &line(3, None), Direction::Take).unwrap();
        assert_eq!(p.inventory.quantity, 2);

        let err = apply_line(&mut p, &line(3, None), Direction::Take).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(m) if m.contains("Insufficient")));
        assert_eq!(p.inventory.quantity, 2);

        apply_line(&mut p, &line(3, None), Direction::Restore).unwrap();
        assert_eq!(p.inventory.quantity, 5);
    }

    #[test]
    fn test_variant_stock_is_separate() {
        let mut p = product(0, vec![eighth(4)]);
        apply_line(&mut p, &line(4, Some("3.5g")), Direction::Take).unwrap();
        assert_eq!(p.variants[0].inventory.quantity, 0);
        assert_eq!(p.inventory.quantity, 0);
    }

    #[test]
    fn test_untracked_stock_is_untouched() {
        let mut p = product(0, vec![]);
        p.inventory.track_inventory = false;
        apply_line(&mut p, &line(10, None), Direction::Take).unwrap();
        assert_eq!(p.inventory.quantity, 0);
    }

    #[test]
    fn test_restore_ignores_removed_variant() {
        let mut p = product(1, vec![]);
        apply_line(&mut p, &line(2, Some("7g")), Direction::Restore).unwrap();
        assert!(apply_line(&mut p, &line(2, Some("7g")), Direction::Take).is_err());
    }
}
