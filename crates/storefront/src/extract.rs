//! Request extractors that reject with the JSON error envelope.
//!
//! Drop-in replacements for axum's `Json`, `Path` and `Query`. A body,
//! path segment or query string that fails to deserialize becomes
//! `AppError::BadRequest` (400) carrying the serde message, instead of
//! axum's plain-text 400/415/422.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;

/// JSON request body, and JSON response body.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Typed path parameters.
#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

/// Typed query string.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::routing::{get, post};
    use serde::Deserialize;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Restock {
        quantity: i32,
    }

    #[derive(Debug, Deserialize)]
    struct Page {
        page: u32,
    }

    async fn restock(Json(body): Json<Restock>) -> Json<i32> {
        Json(body.quantity)
    }

    async fn item(Path(id): Path<i64>, Query(q): Query<Page>) -> Json<(i64, u32)> {
        Json((id, q.page))
    }

    fn app() -> Router {
        Router::new()
            .route("/restock", post(restock))
            .route("/items/{id}", get(item))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::post("/restock")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_passes_through() {
        let (status, body) = send(post_json(r#"{"quantity": 4}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, 4);
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_400_envelope() {
        let (status, body) = send(post_json(r#"{"quantity": true}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("quantity"));
    }

    #[tokio::test]
    async fn test_missing_field_and_bad_syntax_are_400() {
        for raw in ["{}", "{not json"] {
            let (status, body) = send(post_json(raw)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
            assert_eq!(body["success"], false);
        }
    }

    #[tokio::test]
    async fn test_missing_content_type_is_400() {
        let request = Request::post("/restock")
            .body(Body::from(r#"{"quantity": 4}"#))
            .unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_bad_path_and_query_are_400() {
        let bad_path = Request::get("/items/abc?page=1").body(Body::empty()).unwrap();
        let (status, body) = send(bad_path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let bad_query = Request::get("/items/3?page=first").body(Body::empty()).unwrap();
        let (status, _) = send(bad_query).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let ok = Request::get("/items/3?page=2").body(Body::empty()).unwrap();
        let (status, body) = send(ok).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([3, 2]));
    }
}
