//! Cart pricing.
//!
//! The quote runs the same pricing as order placement but writes nothing,
//! so shoppers can see totals before signing in. Coupons still need a
//! session because they belong to an account.

use axum::{Router, extract::State, routing::post};

use super::{ApiResult, ok};
use crate::db::UserRepository;
use crate::extract::Json;
use crate::middleware::OptionalAuth;
use crate::services::checkout::{CheckoutRequest, CheckoutService, Quote};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/quote", post(quote))
}

/// POST /api/checkout/quote
pub async fn quote(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Quote> {
    let pool = state.pool();
    let user = match (&current, &request.coupon_code) {
        (Some(current), Some(_)) => UserRepository::new(pool).get_by_id(current.id).await?,
        _ => None,
    };

    let shipping = state.shipping().get(pool).await;
    let loyalty = state.loyalty().get(pool).await;
    let quote = CheckoutService::new(pool)
        .quote(&request, user.as_ref(), &shipping, &loyalty)
        .await?;
    Ok(ok(quote))
}
