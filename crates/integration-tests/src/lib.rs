//! Integration tests for Canopy.
//!
//! Black-box tests against a running storefront server. They are
//! `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! canopy migrate && canopy seed
//! canopy admin create -e "$CANOPY_TEST_ADMIN_EMAIL" -p "$CANOPY_TEST_ADMIN_PASSWORD"
//! cargo run -p canopy-storefront &
//! cargo test -p canopy-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `CANOPY_TEST_BASE_URL` - Server under test (default: <http://localhost:3000>)
//! - `CANOPY_TEST_ADMIN_EMAIL` / `CANOPY_TEST_ADMIN_PASSWORD` - Admin login
//!   for back-office tests

#![allow(clippy::missing_panics_doc, clippy::indexing_slicing)]

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("CANOPY_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// URL for `path` on the server under test.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url().trim_end_matches('/'))
}

/// A client that keeps the session cookie between requests.
///
/// Each client presents its own proxy address so the per-IP credential
/// limiter does not trip across tests.
#[must_use]
pub fn client() -> Client {
    let bytes = Uuid::new_v4().into_bytes();
    let ip = format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2]);
    let mut headers = HeaderMap::new();
    headers.insert("x-real-ip", HeaderValue::from_str(&ip).expect("valid header"));
    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// A unique address so repeated runs never collide.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}+{}@canopy.test", Uuid::new_v4().simple())
}

/// Read a response as the JSON envelope, asserting the status.
pub async fn envelope(response: Response, expected: StatusCode) -> Value {
    let status = response.status();
    let body: Value = response.json().await.expect("Response is not JSON");
    assert_eq!(status, expected, "unexpected status, body: {body}");
    body
}

/// Register and sign in a fresh customer; returns the user document.
pub async fn register_customer(client: &Client, referral_code: Option<&str>) -> Value {
    let response = client
        .post(url("/api/auth/register"))
        .json(&json!({
            "email": unique_email("shopper"),
            "password": "correct-horse-battery",
            "first_name": "Jamie",
            "referral_code": referral_code,
        }))
        .send()
        .await
        .expect("Failed to register");
    envelope(response, StatusCode::CREATED).await["data"].clone()
}

/// A client signed in as the configured admin, or `None` when no admin
/// credentials are configured.
pub async fn admin_client() -> Option<Client> {
    let email = std::env::var("CANOPY_TEST_ADMIN_EMAIL").ok()?;
    let password = std::env::var("CANOPY_TEST_ADMIN_PASSWORD").ok()?;
    let client = client();
    let response = client
        .post(url("/api/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in");
    envelope(response, StatusCode::OK).await;
    Some(client)
}
