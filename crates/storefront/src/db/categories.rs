//! Category repository.

use sqlx::PgPool;

use canopy_core::CategoryId;

use super::RepositoryError;
use crate::models::{Category, CategoryInput};

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, parent_id, is_active, is_system, sort_order, created_at, updated_at";

const DUPLICATE_SLUG: &str = "A category with this slug already exists";

/// Outcome of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// System categories are never deleted.
    Protected,
}

pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<Category> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active OR $1 ORDER BY sort_order, name"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let row: Option<Category> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken or the
    /// parent does not exist.
    pub async fn create(
        &self,
        input: &CategoryInput,
        slug: &str,
        is_system: bool,
    ) -> Result<Category, RepositoryError> {
        let row: Category = sqlx::query_as(&format!(
            r"
            INSERT INTO categories (name, slug, description, parent_id, is_active, is_system, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(input.name.trim())
        .bind(slug)
        .bind(input.description.as_deref())
        .bind(input.parent_id)
        .bind(input.is_active)
        .bind(is_system)
        .bind(input.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, DUPLICATE_SLUG))?;
        Ok(row)
    }

    /// Insert a system category unless its slug already exists.
    ///
    /// Returns `true` when a row was inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn ensure_system(
        &self,
        name: &str,
        slug: &str,
        sort_order: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO categories (name, slug, is_system, sort_order)
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (slug) DO NOTHING
            ",
        )
        .bind(name)
        .bind(slug)
        .bind(sort_order)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken or the new
    /// parent would put the category inside its own subtree.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
        slug: &str,
    ) -> Result<Category, RepositoryError> {
        if let Some(parent) = input.parent_id
            && self.is_descendant_or_self(parent, id).await?
        {
            return Err(RepositoryError::Conflict(
                "A category cannot be nested under itself or its descendants".to_owned(),
            ));
        }

        let row: Option<Category> = sqlx::query_as(&format!(
            r"
            UPDATE categories SET
                name = $2, slug = $3, description = $4, parent_id = $5,
                is_active = $6, sort_order = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(slug)
        .bind(input.description.as_deref())
        .bind(input.parent_id)
        .bind(input.is_active)
        .bind(input.sort_order)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, DUPLICATE_SLUG))?;

        row.ok_or(RepositoryError::NotFound)
    }

    /// Whether `ancestor` appears on the parent chain of `category`,
    /// counting `category` itself. `UNION` stops on rows already seen, so
    /// an existing cycle cannot loop forever.
    async fn is_descendant_or_self(
        &self,
        category: CategoryId,
        ancestor: CategoryId,
    ) -> Result<bool, RepositoryError> {
        let found: bool = sqlx::query_scalar(
            r"
            WITH RECURSIVE chain (id, parent_id) AS (
                SELECT id, parent_id FROM categories WHERE id = $1
                UNION
                SELECT c.id, c.parent_id FROM categories c JOIN chain ON c.id = chain.parent_id
            )
            SELECT EXISTS (SELECT 1 FROM chain WHERE id = $2)
            ",
        )
        .bind(category)
        .bind(ancestor)
        .fetch_one(self.pool)
        .await?;
        Ok(found)
    }

    /// Delete a non-system category. Children are detached by the
    /// `ON DELETE SET NULL` foreign key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: CategoryId) -> Result<DeleteOutcome, RepositoryError> {
        let is_system: Option<bool> =
            sqlx::query_scalar("SELECT is_system FROM categories WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        match is_system {
            None => Ok(DeleteOutcome::NotFound),
            Some(true) => Ok(DeleteOutcome::Protected),
            Some(false) => {
                let result =
                    sqlx::query("DELETE FROM categories WHERE id = $1 AND NOT is_system")
                        .bind(id)
                        .execute(self.pool)
                        .await?;
                Ok(if result.rows_affected() > 0 {
                    DeleteOutcome::Deleted
                } else {
                    DeleteOutcome::NotFound
                })
            }
        }
    }
}
