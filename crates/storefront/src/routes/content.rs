//! CMS routes: pages and blog posts.
//!
//! Shoppers only ever see published documents; an unpublished slug is a 404.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;

use canopy_core::{PageId, PostId};

use super::{ApiResponse, ApiResult, Deleted, created, ok, paginated};
use crate::db::{PageRepository, PostRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{Page, PageInput, Paging, Post, PostInput, resolve_slug};
use crate::state::AppState;

/// `?tag=` filter on post listings.
#[derive(Debug, Default, Deserialize)]
pub struct PostFilter {
    pub tag: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pages/{slug}", get(show_page))
        .route("/posts", get(posts))
        .route("/posts/{slug}", get(show_post))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/pages", get(admin_pages).post(create_page))
        .route("/pages/{id}", put(update_page).delete(delete_page))
        .route("/posts", get(admin_posts).post(create_post))
        .route("/posts/{id}", put(update_post).delete(delete_post))
}

// =============================================================================
// Public
// =============================================================================

/// GET /api/pages/{slug}
pub async fn show_page(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Page> {
    let page = PageRepository::new(state.pool())
        .get_by_slug(&slug, false)
        .await?
        .ok_or_else(|| AppError::not_found("page"))?;
    Ok(ok(page))
}

/// GET /api/posts
pub async fn posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
    Query(paging): Query<Paging>,
) -> Result<Json<ApiResponse<Vec<Post>>>> {
    let listing = PostRepository::new(state.pool())
        .list(paging, filter.tag.as_deref(), false)
        .await?;
    Ok(paginated(listing, paging))
}

/// GET /api/posts/{slug}
pub async fn show_post(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Post> {
    let post = PostRepository::new(state.pool())
        .get_by_slug(&slug, false)
        .await?
        .ok_or_else(|| AppError::not_found("post"))?;
    Ok(ok(post))
}

// =============================================================================
// Admin: pages
// =============================================================================

/// GET /api/admin/pages
pub async fn admin_pages(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> ApiResult<Vec<Page>> {
    Ok(ok(PageRepository::new(state.pool()).list().await?))
}

/// POST /api/admin/pages
#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_page(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<PageInput>,
) -> Result<(StatusCode, Json<ApiResponse<Page>>)> {
    input.validate()?;
    let slug = resolve_slug(&input.title, input.slug.as_deref())?;
    let page = PageRepository::new(state.pool()).create(&input, &slug).await?;
    tracing::info!(page_id = %page.id, slug = %page.slug, "Page created");
    Ok(created(page))
}

/// PUT /api/admin/pages/{id}
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, page_id = %id))]
pub async fn update_page(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<PageId>,
    Json(input): Json<PageInput>,
) -> ApiResult<Page> {
    input.validate()?;
    let slug = resolve_slug(&input.title, input.slug.as_deref())?;
    let page = PageRepository::new(state.pool())
        .update(id, &input, &slug)
        .await?;
    Ok(ok(page))
}

/// DELETE /api/admin/pages/{id}
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, page_id = %id))]
pub async fn delete_page(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<PageId>,
) -> ApiResult<Deleted> {
    if !PageRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::not_found("page"));
    }
    Ok(ok(Deleted { deleted: true }))
}

// =============================================================================
// Admin: posts
// =============================================================================

/// Drafts included.
///
/// GET /api/admin/posts
pub async fn admin_posts(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(filter): Query<PostFilter>,
    Query(paging): Query<Paging>,
) -> Result<Json<ApiResponse<Vec<Post>>>> {
    let listing = PostRepository::new(state.pool())
        .list(paging, filter.tag.as_deref(), true)
        .await?;
    Ok(paginated(listing, paging))
}

/// POST /api/admin/posts
#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_post(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(mut input): Json<PostInput>,
) -> Result<(StatusCode, Json<ApiResponse<Post>>)> {
    input.validate()?;
    let slug = resolve_slug(&input.title, input.slug.as_deref())?;
    let post = PostRepository::new(state.pool()).create(&input, &slug).await?;
    tracing::info!(post_id = %post.id, slug = %post.slug, "Post created");
    Ok(created(post))
}

/// PUT /api/admin/posts/{id}
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, post_id = %id))]
pub async fn update_post(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<PostId>,
    Json(mut input): Json<PostInput>,
) -> ApiResult<Post> {
    input.validate()?;
    let slug = resolve_slug(&input.title, input.slug.as_deref())?;
    let post = PostRepository::new(state.pool())
        .update(id, &input, &slug)
        .await?;
    Ok(ok(post))
}

/// DELETE /api/admin/posts/{id}
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, post_id = %id))]
pub async fn delete_post(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<PostId>,
) -> ApiResult<Deleted> {
    if !PostRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::not_found("post"));
    }
    Ok(ok(Deleted { deleted: true }))
}
