//! Catalog product routes.

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
    routing::get,
};

use canopy_core::ProductId;

use super::{ApiResponse, ApiResult, Deleted, created, ok, paginated};
use crate::db::ProductRepository;
use crate::db::products::ProductFilter;
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{Paging, ProductInput, ProductView, resolve_slug};
use crate::state::AppState;

/// Shared caches may keep public catalog responses this long.
const PUBLIC_CACHE: HeaderValue = HeaderValue::from_static("public, max-age=60");

/// Create the public product routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{slug}", get(show))
}

/// Create the admin product routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_index).post(create))
        .route("/{id}", get(admin_show).put(update).delete(destroy))
}

// =============================================================================
// Public
// =============================================================================

/// Active products matching the query string filters.
///
/// GET /api/products
pub async fn index(
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
    Query(paging): Query<Paging>,
) -> Result<Response> {
    filter.include_inactive = false;
    let listing = ProductRepository::new(state.pool())
        .list(&filter, paging)
        .await?;
    let mut response = paginated::<_, ProductView>(listing, paging).into_response();
    response.headers_mut().insert(CACHE_CONTROL, PUBLIC_CACHE);
    Ok(response)
}

/// One active product.
///
/// GET /api/products/{slug}
pub async fn show(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Response> {
    let product = ProductRepository::new(state.pool())
        .get_by_slug(&slug, false)
        .await?
        .ok_or_else(|| AppError::not_found("product"))?;
    let mut response = ok(ProductView::from(product)).into_response();
    response.headers_mut().insert(CACHE_CONTROL, PUBLIC_CACHE);
    Ok(response)
}

// =============================================================================
// Admin
// =============================================================================

/// All products, inactive included.
///
/// GET /api/admin/products
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(mut filter): Query<ProductFilter>,
    Query(paging): Query<Paging>,
) -> Result<Json<ApiResponse<Vec<ProductView>>>> {
    filter.include_inactive = true;
    let listing = ProductRepository::new(state.pool())
        .list(&filter, paging)
        .await?;
    Ok(paginated(listing, paging))
}

/// GET /api/admin/products/{id}
pub async fn admin_show(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> ApiResult<ProductView> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("product"))?;
    Ok(ok(product.into()))
}

/// POST /api/admin/products
#[tracing::instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductView>>)> {
    input.validate()?;
    let slug = resolve_slug(&input.name, input.slug.as_deref())?;
    let product = ProductRepository::new(state.pool())
        .create(&input, &slug)
        .await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok(created(product.into()))
}

/// PUT /api/admin/products/{id}
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> ApiResult<ProductView> {
    input.validate()?;
    let slug = resolve_slug(&input.name, input.slug.as_deref())?;
    let product = ProductRepository::new(state.pool())
        .update(id, &input, &slug)
        .await?;
    Ok(ok(product.into()))
}

/// DELETE /api/admin/products/{id}
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> ApiResult<Deleted> {
    if !ProductRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::not_found("product"));
    }
    tracing::info!("Product deleted");
    Ok(ok(Deleted { deleted: true }))
}
