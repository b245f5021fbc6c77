//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. Server-side failures
//! are captured to Sentry and logged before a generic message goes back to
//! the client in the standard `{ "success": false, "error": ... }` envelope.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use canopy_core::ReferralCodeError;

use crate::db::RepositoryError;
use crate::models::ValidationError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::loyalty::LoyaltyError;

/// Whether 500 responses carry the underlying error text.
static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Allow or forbid internal error details in responses.
///
/// Called once at startup from the configured environment; production
/// leaves this off.
pub fn set_expose_details(expose: bool) {
    EXPOSE_DETAILS.store(expose, Ordering::Relaxed);
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart could not be priced or placed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Points could not be spent or adjusted.
    #[error("Loyalty error: {0}")]
    Loyalty(#[from] LoyaltyError),

    /// Referral code could not be generated.
    #[error("Referral code error: {0}")]
    ReferralCode(#[from] ReferralCodeError<RepositoryError>),

    /// Request body failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing session, or a session without the required role.
    #[error("Unauthorized")]
    Unauthorized,

    /// Invalid input from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure body of the JSON envelope.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Build a `BadRequest` from anything printable.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Build a `NotFound` for a named resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(RepositoryError::Conflict(_) | RepositoryError::NotFound)
            | Self::ReferralCode(ReferralCodeError::Lookup(RepositoryError::Conflict(_))) => false,
            Self::Database(_) | Self::Internal(_) | Self::ReferralCode(_) => true,
            Self::Auth(err) => err.is_server_error(),
            Self::Loyalty(err) => err.is_server_error(),
            Self::Checkout(err) => err.is_server_error(),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::Conflict(_))
            | Self::ReferralCode(ReferralCodeError::Lookup(RepositoryError::Conflict(_)))
            | Self::BadRequest(_)
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Auth(err) => err.status(),
            Self::Checkout(err) if !err.is_server_error() => StatusCode::BAD_REQUEST,
            Self::Loyalty(LoyaltyError::RewardNotFound | LoyaltyError::UserNotFound) => {
                StatusCode::NOT_FOUND
            }
            Self::Loyalty(err) if !err.is_server_error() => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_)
            | Self::Checkout(_)
            | Self::Loyalty(_)
            | Self::ReferralCode(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        if self.is_server_error() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Database(RepositoryError::Conflict(what))
            | Self::ReferralCode(ReferralCodeError::Lookup(RepositoryError::Conflict(what))) => {
                what.clone()
            }
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Auth(err) => err.public_message(),
            Self::Checkout(err) => err.to_string(),
            Self::Loyalty(err) => err.to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let details = if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
            EXPOSE_DETAILS
                .load(Ordering::Relaxed)
                .then(|| self.to_string())
        } else {
            None
        };

        let body = ErrorBody {
            success: false,
            error: self.public_message(),
            details,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after login.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_codes() {
        let cases = [
            (AppError::not_found("product"), StatusCode::NOT_FOUND),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::bad_request("name is required"), StatusCode::BAD_REQUEST),
            (AppError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                AppError::from(ValidationError::new("price must not be negative")),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Database(RepositoryError::Conflict("slug already exists".into())),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_unauthorized_message_is_generic() {
        let (status, body) = body_json(AppError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_duplicate_key_surfaces_readable_message() {
        let err = AppError::Database(RepositoryError::Conflict(
            "A product with this slug already exists".into(),
        ));
        let (_, body) = body_json(err).await;
        assert_eq!(body["error"], "A product with this slug already exists");
    }

    #[tokio::test]
    async fn test_referral_code_race_is_client_error() {
        let err = AppError::from(ReferralCodeError::Lookup(RepositoryError::Conflict(
            "Referral code already exists".into(),
        )));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Referral code already exists");

        let exhausted = AppError::from(ReferralCodeError::<RepositoryError>::Exhausted {
            attempts: 11,
        });
        assert_eq!(
            exhausted.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let (_, body) = body_json(AppError::Internal("connection reset".into())).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());
    }
}
