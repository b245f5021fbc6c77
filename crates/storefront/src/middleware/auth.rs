//! Authentication extractors.
//!
//! Handlers ask for the caller with [`RequireAuth`], [`RequireAdmin`] or
//! [`OptionalAuth`]. A missing session and a session without the admin role
//! are both plain 401s.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a signed-in admin.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is signed in.
pub struct OptionalAuth(pub Option<CurrentUser>);

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await
            .map(Self)
            .ok_or(AppError::Unauthorized)
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match current_user(parts).await {
            Some(user) if user.is_admin() => Ok(Self(user)),
            Some(user) => {
                tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin on admin route");
                Err(AppError::Unauthorized)
            }
            None => Err(AppError::Unauthorized),
        }
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await))
    }
}

/// Store the signed-in user in the session.
///
/// The session ID is cycled first so a pre-login session ID cannot be
/// reused after login.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Forget the signed-in user (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, extract::Request, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use super::*;
    use crate::test_support::{TEST_ROLE_HEADER, sign_in_from_header};

    fn app() -> Router {
        Router::new()
            .route("/me", get(|RequireAuth(u): RequireAuth| async move { u.email.to_string() }))
            .route("/admin", get(|RequireAdmin(_): RequireAdmin| async { "ok" }))
            .route(
                "/maybe",
                get(|OptionalAuth(u): OptionalAuth| async move {
                    u.map_or_else(|| "guest".to_owned(), |u| u.role.to_string())
                }),
            )
            .layer(middleware::from_fn(sign_in_from_header))
            .layer(SessionManagerLayer::new(MemoryStore::default()))
    }

    async fn call(path: &str, role: Option<&str>) -> (StatusCode, String) {
        let mut request = Request::builder().uri(path);
        if let Some(role) = role {
            request = request.header(TEST_ROLE_HEADER, role);
        }
        let response = app()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_require_auth() {
        assert_eq!(call("/me", None).await.0, StatusCode::UNAUTHORIZED);
        let (status, body) = call("/me", Some("customer")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "sam@canopy.test");
    }

    #[tokio::test]
    async fn test_require_admin_rejects_customers() {
        assert_eq!(call("/admin", None).await.0, StatusCode::UNAUTHORIZED);
        let (status, body) = call("/admin", Some("customer")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("\"error\":\"Unauthorized\""));
        assert_eq!(call("/admin", Some("admin")).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_optional_auth() {
        assert_eq!(call("/maybe", None).await.1, "guest");
        assert_eq!(call("/maybe", Some("admin")).await.1, "admin");
    }
}
