//! Order routes for customers and the back office.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::Deserialize;

use canopy_core::{OrderId, OrderStatus};

use super::{ApiResponse, ApiResult, created, ok, paginated};
use crate::db::orders::TrackingUpdate;
use crate::db::{OrderRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{Order, Paging};
use crate::services::checkout::{CheckoutRequest, CheckoutService};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// `?status=` filter on the admin listing.
#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

/// Status change body.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
    #[serde(flatten)]
    pub tracking: TrackingRequest,
}

/// Tracking details; every field optional.
#[derive(Debug, Default, Deserialize)]
pub struct TrackingRequest {
    pub note: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}

impl TrackingRequest {
    fn is_empty(&self) -> bool {
        [&self.note, &self.carrier, &self.tracking_number]
            .iter()
            .all(|field| field.as_deref().is_none_or(|v| v.trim().is_empty()))
    }
}

impl From<TrackingRequest> for TrackingUpdate {
    fn from(request: TrackingRequest) -> Self {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
        };
        Self {
            note: clean(request.note),
            carrier: clean(request.carrier),
            tracking_number: clean(request.tracking_number),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(mine).post(place))
        .route("/{id}", get(show_mine))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_index))
        .route("/{id}", get(admin_show))
        .route("/{id}/status", patch(update_status))
        .route("/{id}/tracking", post(add_tracking))
}

// =============================================================================
// Customer
// =============================================================================

/// Place an order for the signed-in customer.
///
/// POST /api/orders
#[tracing::instrument(skip_all, fields(user_id = %current.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>)> {
    let pool = state.pool();
    let user = UserRepository::new(pool)
        .get_by_id(current.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let shipping = state.shipping().get(pool).await;
    let payment = state.payment().get(pool).await;
    let loyalty = state.loyalty().get(pool).await;

    let order = CheckoutService::new(pool)
        .place(&request, &user, &shipping, &payment, &loyalty)
        .await?;
    Ok(created(order))
}

/// GET /api/orders
pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Query(paging): Query<Paging>,
) -> Result<Json<ApiResponse<Vec<Order>>>> {
    let listing = OrderRepository::new(state.pool())
        .list_for_user(current.id, paging)
        .await?;
    Ok(paginated(listing, paging))
}

/// Someone else's order is a 404, not a 401.
///
/// GET /api/orders/{id}
pub async fn show_mine(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<OrderId>,
) -> ApiResult<Order> {
    let order = OrderRepository::new(state.pool())
        .get_for_user(id, current.id)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;
    Ok(ok(order))
}

// =============================================================================
// Admin
// =============================================================================

/// GET /api/admin/orders
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(filter): Query<OrderFilter>,
    Query(paging): Query<Paging>,
) -> Result<Json<ApiResponse<Vec<Order>>>> {
    let listing = OrderRepository::new(state.pool())
        .list(filter.status, paging)
        .await?;
    Ok(paginated(listing, paging))
}

/// GET /api/admin/orders/{id}
pub async fn admin_show(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<OrderId>,
) -> ApiResult<Order> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;
    Ok(ok(order))
}

/// Move an order to a new status.
///
/// Delivery pays out loyalty points and the pending referral; cancellation
/// puts stock back.
///
/// PATCH /api/admin/orders/{id}/status
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, order_id = %id, status = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<Order> {
    let pool = state.pool();
    let loyalty = state.loyalty().get(pool).await;
    let order = OrderService::new(pool)
        .update_status(id, body.status, &body.tracking.into(), &loyalty)
        .await?;
    Ok(ok(order))
}

/// Append a tracking event without changing the status.
///
/// POST /api/admin/orders/{id}/tracking
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn add_tracking(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<TrackingRequest>,
) -> ApiResult<Order> {
    if body.is_empty() {
        return Err(AppError::bad_request(
            "note, carrier or tracking_number is required",
        ));
    }
    let order = OrderRepository::new(state.pool())
        .add_tracking(id, &body.into())
        .await?;
    Ok(ok(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_request_flattens_tracking() {
        let body: StatusRequest = serde_json::from_str(
            r#"{"status":"shipped","carrier":" UPS ","tracking_number":"1Z999"}"#,
        )
        .unwrap();
        assert_eq!(body.status, OrderStatus::Shipped);
        let update = TrackingUpdate::from(body.tracking);
        assert_eq!(update.carrier.as_deref(), Some("UPS"));
        assert_eq!(update.tracking_number.as_deref(), Some("1Z999"));
        assert!(update.note.is_none());
    }

    #[test]
    fn test_blank_tracking_is_empty() {
        let body: TrackingRequest = serde_json::from_str(r#"{"note":"  "}"#).unwrap();
        assert!(body.is_empty());
        let body: TrackingRequest = serde_json::from_str(r#"{"note":"Left at door"}"#).unwrap();
        assert!(!body.is_empty());
    }
}
