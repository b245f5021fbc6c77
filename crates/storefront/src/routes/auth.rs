//! Account routes: registration, login, logout and the current user.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use super::{ApiResponse, ApiResult, created, ok};
use crate::db::UserRepository;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::extract::Json;
use crate::middleware::{RequireAuth, auth_rate_limiter, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create the account routes router.
///
/// Login and registration sit behind the strict credential limiter.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .layer(auth_rate_limiter())
        .route("/logout", post(logout))
        .route("/me", get(me))
}

async fn sign_in(session: &Session, user: &User) -> crate::error::Result<()> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Create a customer account and sign it in.
///
/// POST /api/auth/register
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(registration): Json<Registration>,
) -> crate::error::Result<(StatusCode, Json<ApiResponse<User>>)> {
    let user = AuthService::new(state.pool()).register(&registration).await?;
    sign_in(&session, &user).await?;
    Ok(created(user))
}

/// Sign in with email and password.
///
/// POST /api/auth/login
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> ApiResult<User> {
    let user = AuthService::new(state.pool())
        .login(&request.email, &request.password)
        .await?;
    sign_in(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User signed in");
    Ok(ok(user))
}

/// Forget the session.
///
/// POST /api/auth/logout
pub async fn logout(session: Session) -> ApiResult<()> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(ok(()))
}

/// The signed-in user, re-read so balances are current.
///
/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> ApiResult<User> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(ok(user))
}
