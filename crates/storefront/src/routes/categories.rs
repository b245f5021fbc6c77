//! Category routes.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};

use canopy_core::CategoryId;

use super::{ApiResponse, ApiResult, Deleted, created, ok};
use crate::db::CategoryRepository;
use crate::db::categories::DeleteOutcome;
use crate::error::{AppError, Result};
use crate::extract::{Json, Path};
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryInput, resolve_slug};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{slug}", get(show))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_index).post(create))
        .route("/{id}", put(update).delete(destroy))
}

/// GET /api/categories
pub async fn index(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    let categories = CategoryRepository::new(state.pool()).list(false).await?;
    Ok(ok(categories))
}

/// GET /api/categories/{slug}
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Category> {
    let category = CategoryRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::not_found("category"))?;
    Ok(ok(category))
}

/// GET /api/admin/categories
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> ApiResult<Vec<Category>> {
    let categories = CategoryRepository::new(state.pool()).list(true).await?;
    Ok(ok(categories))
}

/// POST /api/admin/categories
#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>)> {
    input.validate()?;
    let slug = resolve_slug(&input.name, input.slug.as_deref())?;
    let category = CategoryRepository::new(state.pool())
        .create(&input, &slug, false)
        .await?;
    tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok(created(category))
}

/// PUT /api/admin/categories/{id}
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<Category> {
    input.validate()?;
    let slug = resolve_slug(&input.name, input.slug.as_deref())?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &input, &slug)
        .await?;
    Ok(ok(category))
}

/// DELETE /api/admin/categories/{id}
///
/// System categories are refused with a 400.
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> ApiResult<Deleted> {
    match CategoryRepository::new(state.pool()).delete(id).await? {
        DeleteOutcome::Deleted => {
            tracing::info!("Category deleted");
            Ok(ok(Deleted { deleted: true }))
        }
        DeleteOutcome::NotFound => Err(AppError::not_found("category")),
        DeleteOutcome::Protected => Err(AppError::bad_request(
            "System categories cannot be deleted",
        )),
    }
}
