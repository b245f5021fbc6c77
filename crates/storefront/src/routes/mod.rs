//! HTTP route handlers.
//!
//! Every response uses the same envelope: `{ "success": true, "data": ... }`
//! on success, optionally with `pagination`, and the
//! [`AppError`](crate::error::AppError) body on failure.
//!
//! # Route Structure
//!
//! ```text
//! # Accounts
//! POST /api/auth/register              - Create a customer account
//! POST /api/auth/login                 - Sign in
//! POST /api/auth/logout                - Sign out
//! GET  /api/auth/me                    - Current user
//!
//! # Catalog
//! GET  /api/products                   - Product listing (filters, paging)
//! GET  /api/products/{slug}            - Product detail
//! GET  /api/categories                 - Active categories
//! GET  /api/categories/{slug}          - Category detail
//!
//! # Checkout & orders (auth)
//! POST /api/checkout/quote             - Price a cart
//! POST /api/orders                     - Place an order
//! GET  /api/orders                     - My orders
//! GET  /api/orders/{id}                - One of my orders
//!
//! # Loyalty & referrals (auth)
//! GET  /api/loyalty                    - Balance, coupons, rewards
//! POST /api/loyalty/redeem             - Spend points on a reward
//! GET  /api/referrals/me               - My code and referrals
//!
//! # CMS
//! GET  /api/pages/{slug}               - Published page
//! GET  /api/posts                      - Published posts (tag, paging)
//! GET  /api/posts/{slug}               - Published post
//!
//! # Settings
//! GET  /api/settings/{kind}            - shipping | payment | navigation | loyalty
//! PUT  /api/settings/{kind}            - Replace a settings document (admin)
//!
//! # Admin (role = admin)
//! /api/admin/products[/{id}]           - Product CRUD
//! /api/admin/categories[/{id}]         - Category CRUD
//! /api/admin/orders[/{id}]             - Order listing and detail
//! PATCH /api/admin/orders/{id}/status  - Status change
//! POST  /api/admin/orders/{id}/tracking - Tracking event
//! /api/admin/pages[/{id}]              - Page CRUD
//! /api/admin/posts[/{id}]              - Post CRUD
//! /api/admin/loyalty/rewards[/{id}]    - Reward CRUD
//! GET   /api/admin/referrals           - All referrals
//! GET   /api/admin/users               - User listing (search)
//! PATCH /api/admin/users/{id}/role     - Change role
//! POST  /api/admin/users/{id}/points   - Adjust points balance
//! POST  /api/admin/settings/cache/clear - Empty the settings caches
//! ```

pub mod auth;
pub mod categories;
pub mod checkout;
pub mod content;
pub mod loyalty;
pub mod orders;
pub mod products;
pub mod referrals;
pub mod settings;
pub mod users;

use axum::{Router, http::StatusCode};
use serde::Serialize;

use crate::db::Listing;
use crate::extract::Json;
use crate::models::Paging;
use crate::state::AppState;

// =============================================================================
// Response Envelope
// =============================================================================

/// Success body of the JSON envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Paging block attached to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    #[must_use]
    pub fn new(paging: Paging, total: i64) -> Self {
        let limit = paging.limit();
        let divisor = i64::from(limit);
        Self {
            page: paging.page(),
            limit,
            total,
            pages: (total.max(0) + divisor - 1) / divisor,
        }
    }
}

/// Body of delete responses.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

/// Result type of handlers that answer with the envelope.
pub type ApiResult<T> = crate::error::Result<Json<ApiResponse<T>>>;

/// Wrap `data` in a success envelope.
pub const fn ok<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
        pagination: None,
    })
}

/// Success envelope with `201 Created`.
pub const fn created<T>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

/// Success envelope for one page of a listing, converting each item.
pub fn paginated<T, V: From<T>>(listing: Listing<T>, paging: Paging) -> Json<ApiResponse<Vec<V>>> {
    Json(ApiResponse {
        success: true,
        pagination: Some(Pagination::new(paging, listing.total)),
        data: listing.items.into_iter().map(V::from).collect(),
    })
}

// =============================================================================
// Routers
// =============================================================================

/// Back-office routes; every handler takes `RequireAdmin`.
fn admin_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", products::admin_routes())
        .nest("/categories", categories::admin_routes())
        .nest("/orders", orders::admin_routes())
        .merge(content::admin_routes())
        .nest("/loyalty", loyalty::admin_routes())
        .nest("/referrals", referrals::admin_routes())
        .nest("/users", users::admin_routes())
        .nest("/settings", settings::admin_routes())
}

/// Everything served under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/products", products::routes())
        .nest("/categories", categories::routes())
        .nest("/checkout", checkout::routes())
        .nest("/orders", orders::routes())
        .merge(content::routes())
        .nest("/loyalty", loyalty::routes())
        .nest("/referrals", referrals::routes())
        .nest("/settings", settings::routes())
        .nest("/admin", admin_routes())
}
