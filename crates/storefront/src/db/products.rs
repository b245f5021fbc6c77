//! Product repository.
//!
//! Listing filters are assembled with `QueryBuilder` so every client value
//! is bound, never interpolated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use canopy_core::{CategoryId, Inventory, ProductId};

use super::{Listing, RepositoryError, escape_like};
use crate::models::Paging;
use crate::models::product::{Badges, Product, ProductImage, ProductInput, Variant};

pub(super) const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.name, p.slug, p.description, p.price, p.original_price, p.images,
           p.category_id, p.inventory, p.variants, p.badges, p.is_active, p.is_featured,
           p.average_rating, p.review_count, p.created_at, p.updated_at,
           ARRAY(
               SELECT pc.category_id FROM product_categories pc
               WHERE pc.product_id = p.id ORDER BY pc.category_id
           ) AS category_ids
    FROM products p";

const DUPLICATE_SLUG: &str = "A product with this slug already exists";

#[derive(FromRow)]
pub(super) struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    original_price: Option<Decimal>,
    images: Json<Vec<ProductImage>>,
    category_id: Option<CategoryId>,
    category_ids: Vec<i64>,
    inventory: Json<Inventory>,
    variants: Json<Vec<Variant>>,
    badges: Json<Badges>,
    is_active: bool,
    is_featured: bool,
    average_rating: Decimal,
    review_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            original_price: row.original_price,
            images: row.images.0,
            category_id: row.category_id,
            category_ids: row.category_ids.into_iter().map(CategoryId::new).collect(),
            inventory: row.inventory.0,
            variants: row.variants.0,
            badges: row.badges.0,
            is_active: row.is_active,
            is_featured: row.is_featured,
            average_rating: row.average_rating,
            review_count: row.review_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    Rating,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.created_at DESC, p.id DESC",
            Self::PriceAsc => " ORDER BY p.price ASC, p.id ASC",
            Self::PriceDesc => " ORDER BY p.price DESC, p.id DESC",
            Self::Name => " ORDER BY LOWER(p.name) ASC, p.id ASC",
            Self::Rating => " ORDER BY p.average_rating DESC, p.review_count DESC, p.id DESC",
        }
    }
}

/// Catalog listing filters, straight from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Category slug; matches primary or secondary categories.
    pub category: Option<String>,
    pub featured: Option<bool>,
    /// Case-insensitive match on name or description.
    pub q: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
    /// Admin listings see inactive products too.
    #[serde(skip)]
    pub include_inactive: bool,
}

impl ProductFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if !self.include_inactive {
            qb.push(" AND p.is_active");
        }
        if let Some(slug) = self.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND EXISTS (SELECT 1 FROM categories c WHERE c.slug = ")
                .push_bind(slug.to_owned())
                .push(
                    " AND (c.id = p.category_id OR c.id IN \
                     (SELECT pc.category_id FROM product_categories pc WHERE pc.product_id = p.id)))",
                );
        }
        if let Some(featured) = self.featured {
            qb.push(" AND p.is_featured = ").push_bind(featured);
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(q));
            qb.push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(min) = self.min_price {
            qb.push(" AND p.price >= ").push_bind(min);
        }
        if let Some(max) = self.max_price {
            qb.push(" AND p.price <= ").push_bind(max);
        }
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        paging: Paging,
    ) -> Result<Listing<Product>, RepositoryError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products p");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::new(PRODUCT_SELECT);
        filter.push_where(&mut query);
        query.push(filter.sort.order_by());
        query
            .push(" LIMIT ")
            .push_bind(i64::from(paging.limit()))
            .push(" OFFSET ")
            .push_bind(paging.offset());

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.pool).await?;

        Ok(Listing {
            items: rows.into_iter().map(Product::from).collect(),
            total,
        })
    }

    /// Get a product by slug. Inactive products are only returned when
    /// `include_inactive` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_inactive: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "{PRODUCT_SELECT} WHERE p.slug = $1 AND (p.is_active OR $2)"
        ))
        .bind(slug)
        .bind(include_inactive)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    /// Get a product by ID regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    /// Get several products by ID, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("{PRODUCT_SELECT} WHERE p.id = ANY($1)"))
                .bind(ids)
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Insert a product and its category links.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken or a
    /// category does not exist.
    pub async fn create(&self, input: &ProductInput, slug: &str) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO products
                (name, slug, description, price, original_price, images, category_id,
                 inventory, variants, badges, is_active, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            ",
        )
        .bind(input.name.trim())
        .bind(slug)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.original_price)
        .bind(Json(&input.images))
        .bind(input.category_id)
        .bind(Json(&input.inventory))
        .bind(Json(&input.variants))
        .bind(Json(&input.badges))
        .bind(input.is_active)
        .bind(input.is_featured)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, DUPLICATE_SLUG))?;

        link_categories(&mut tx, id, &input.category_ids).await?;
        tx.commit().await?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace a product's fields and category links.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
        slug: &str,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<ProductId> = sqlx::query_scalar(
            r"
            UPDATE products SET
                name = $2, slug = $3, description = $4, price = $5, original_price = $6,
                images = $7, category_id = $8, inventory = $9, variants = $10, badges = $11,
                is_active = $12, is_featured = $13, updated_at = NOW()
            WHERE id = $1
            RETURNING id
            ",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(slug)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.original_price)
        .bind(Json(&input.images))
        .bind(input.category_id)
        .bind(Json(&input.inventory))
        .bind(Json(&input.variants))
        .bind(Json(&input.badges))
        .bind(input.is_active)
        .bind(input.is_featured)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, DUPLICATE_SLUG))?;

        if updated.is_none() {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_categories(&mut tx, id, &input.category_ids).await?;
        tx.commit().await?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn link_categories(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    product_id: ProductId,
    category_ids: &[CategoryId],
) -> Result<(), RepositoryError> {
    if category_ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = category_ids.iter().map(CategoryId::as_i64).collect();
    sqlx::query(
        r"
        INSERT INTO product_categories (product_id, category_id)
        SELECT $1, UNNEST($2::bigint[])
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(product_id)
    .bind(ids)
    .execute(&mut **tx)
    .await
    .map_err(|e| RepositoryError::from_write(e, "Product is already in this category"))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_binds_every_client_value() {
        let filter = ProductFilter {
            category: Some("edibles".into()),
            featured: Some(true),
            q: Some("50%".into()),
            min_price: Some(Decimal::from(5)),
            max_price: Some(Decimal::from(50)),
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products p");
        filter.push_where(&mut qb);
        let sql = qb.sql();

        assert!(sql.contains("p.is_active"));
        assert!(sql.contains("c.slug = $1"));
        assert!(sql.contains("p.is_featured = $2"));
        assert!(sql.contains("p.name ILIKE $3"));
        assert!(sql.contains("p.price <= $6"));
        assert!(!sql.contains("50%"));
    }

    #[test]
    fn test_admin_filter_includes_inactive() {
        let filter = ProductFilter {
            include_inactive: true,
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products p");
        filter.push_where(&mut qb);
        assert_eq!(qb.sql().trim(), "SELECT COUNT(*) FROM products p WHERE TRUE");
    }

    #[test]
    fn test_sort_from_query_string() {
        let filter: ProductFilter =
            serde_json::from_str(r#"{"sort": "price_desc", "featured": true}"#).unwrap();
        assert_eq!(filter.sort, ProductSort::PriceDesc);
        assert!(filter.sort.order_by().ends_with("p.id DESC"));
    }
}
