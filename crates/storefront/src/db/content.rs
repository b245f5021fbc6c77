//! CMS page and post repositories.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use canopy_core::{PageId, PostId};

use super::{Listing, RepositoryError};
use crate::models::content::next_published_at;
use crate::models::{Page, PageInput, Paging, Post, PostInput, Seo};

const PAGE_COLUMNS: &str =
    "id, title, slug, content, is_published, published_at, seo, created_at, updated_at";

const POST_COLUMNS: &str = "id, title, slug, content, excerpt, author, tags, is_published, \
     published_at, seo, created_at, updated_at";

#[derive(FromRow)]
struct PageRow {
    id: PageId,
    title: String,
    slug: String,
    content: String,
    is_published: bool,
    published_at: Option<DateTime<Utc>>,
    seo: Json<Seo>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PageRow> for Page {
    fn from(row: PageRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            is_published: row.is_published,
            published_at: row.published_at,
            seo: row.seo.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PostRow {
    id: PostId,
    title: String,
    slug: String,
    content: String,
    excerpt: Option<String>,
    author: Option<String>,
    tags: Vec<String>,
    is_published: bool,
    published_at: Option<DateTime<Utc>>,
    seo: Json<Seo>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            excerpt: row.excerpt,
            author: row.author,
            tags: row.tags,
            is_published: row.is_published,
            published_at: row.published_at,
            seo: row.seo.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Pages
// =============================================================================

pub struct PageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PageRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every page, published or not, by title.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Page>, RepositoryError> {
        let rows: Vec<PageRow> =
            sqlx::query_as(&format!("SELECT {PAGE_COLUMNS} FROM pages ORDER BY title"))
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(Page::from).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_unpublished: bool,
    ) -> Result<Option<Page>, RepositoryError> {
        let row: Option<PageRow> = sqlx::query_as(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE slug = $1 AND (is_published OR $2)"
        ))
        .bind(slug)
        .bind(include_unpublished)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Page::from))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &PageInput, slug: &str) -> Result<Page, RepositoryError> {
        let published_at = next_published_at(None, input.is_published, Utc::now());
        let row: PageRow = sqlx::query_as(&format!(
            r"
            INSERT INTO pages (title, slug, content, is_published, published_at, seo)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PAGE_COLUMNS}
            "
        ))
        .bind(input.title.trim())
        .bind(slug)
        .bind(&input.content)
        .bind(input.is_published)
        .bind(published_at)
        .bind(Json(&input.seo))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "A page with this slug already exists"))?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the page does not exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: PageId,
        input: &PageInput,
        slug: &str,
    ) -> Result<Page, RepositoryError> {
        // COALESCE keeps the first publication time.
        let row: Option<PageRow> = sqlx::query_as(&format!(
            r"
            UPDATE pages SET
                title = $2, slug = $3, content = $4, is_published = $5,
                published_at = COALESCE(published_at, CASE WHEN $5 THEN NOW() END),
                seo = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {PAGE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.title.trim())
        .bind(slug)
        .bind(&input.content)
        .bind(input.is_published)
        .bind(Json(&input.seo))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "A page with this slug already exists"))?;
        row.map(Page::from).ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: PageId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Posts
// =============================================================================

pub struct PostRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PostRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Posts, newest publication first. Shoppers only see published ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        paging: Paging,
        tag: Option<&str>,
        include_unpublished: bool,
    ) -> Result<Listing<Post>, RepositoryError> {
        let tag = tag
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        let filter = "(is_published OR $1) AND ($2::text IS NULL OR $2 = ANY(tags))";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM posts WHERE {filter}"))
            .bind(include_unpublished)
            .bind(tag.as_deref())
            .fetch_one(self.pool)
            .await?;

        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            r"
            SELECT {POST_COLUMNS} FROM posts WHERE {filter}
            ORDER BY published_at DESC NULLS LAST, created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(include_unpublished)
        .bind(tag.as_deref())
        .bind(i64::from(paging.limit()))
        .bind(paging.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Listing {
            items: rows.into_iter().map(Post::from).collect(),
            total,
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_unpublished: bool,
    ) -> Result<Option<Post>, RepositoryError> {
        let row: Option<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE slug = $1 AND (is_published OR $2)"
        ))
        .bind(slug)
        .bind(include_unpublished)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Post::from))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &PostInput, slug: &str) -> Result<Post, RepositoryError> {
        let published_at = next_published_at(None, input.is_published, Utc::now());
        let row: PostRow = sqlx::query_as(&format!(
            r"
            INSERT INTO posts (title, slug, content, excerpt, author, tags, is_published, published_at, seo)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(input.title.trim())
        .bind(slug)
        .bind(&input.content)
        .bind(input.excerpt.as_deref())
        .bind(input.author.as_deref())
        .bind(&input.tags)
        .bind(input.is_published)
        .bind(published_at)
        .bind(Json(&input.seo))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "A post with this slug already exists"))?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post does not exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: PostId,
        input: &PostInput,
        slug: &str,
    ) -> Result<Post, RepositoryError> {
        let row: Option<PostRow> = sqlx::query_as(&format!(
            r"
            UPDATE posts SET
                title = $2, slug = $3, content = $4, excerpt = $5, author = $6, tags = $7,
                is_published = $8,
                published_at = COALESCE(published_at, CASE WHEN $8 THEN NOW() END),
                seo = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.title.trim())
        .bind(slug)
        .bind(&input.content)
        .bind(input.excerpt.as_deref())
        .bind(input.author.as_deref())
        .bind(&input.tags)
        .bind(input.is_published)
        .bind(Json(&input.seo))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "A post with this slug already exists"))?;
        row.map(Post::from).ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: PostId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
