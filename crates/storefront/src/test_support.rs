//! Fixtures shared by unit tests.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::{extract::Request, middleware::Next, response::Response};
use secrecy::SecretString;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_sessions::Session;
use url::Url;

use canopy_core::{Email, UserId, UserRole};

use crate::config::{Environment, StorefrontConfig};
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Header naming the role [`sign_in_from_header`] signs the request in as.
pub const TEST_ROLE_HEADER: &str = "x-test-role";

pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://canopy@127.0.0.1:1/canopy"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3000,
        base_url: Url::parse("http://localhost:3000").unwrap(),
        session_secret: SecretString::from("k3J9$vQ2!mZ8@rT5#wX1&yL7*uB4^nC6"),
        environment: Environment::Development,
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// A pool pointed at a closed port; every query fails after a short wait.
pub fn unreachable_pool() -> PgPool {
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy("postgres://canopy@127.0.0.1:1/canopy")
        .unwrap()
}

pub fn test_state() -> AppState {
    AppState::new(test_config(), unreachable_pool())
}

/// Middleware that signs the request in as the role named in
/// [`TEST_ROLE_HEADER`]. Needs a session layer outside it.
pub async fn sign_in_from_header(session: Session, request: Request, next: Next) -> Response {
    let role = request
        .headers()
        .get(TEST_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<UserRole>().ok());
    if let Some(role) = role {
        let user = CurrentUser {
            id: UserId::new(7),
            email: Email::parse("sam@canopy.test").unwrap(),
            first_name: Some("Sam".to_owned()),
            role,
        };
        session.insert(session_keys::CURRENT_USER, &user).await.unwrap();
    }
    next.run(request).await
}
