//! Integration tests for the public and customer API.
//!
//! These tests require:
//! - A migrated and seeded `PostgreSQL` database (`canopy migrate && canopy seed`)
//! - The storefront server running (`cargo run -p canopy-storefront`)
//!
//! Run with: cargo test -p canopy-integration-tests -- --ignored

use canopy_integration_tests::{client, envelope, register_customer, unique_email, url};
use reqwest::StatusCode;
use serde_json::json;

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_endpoints() {
    let client = client();

    let resp = client.get(url("/health")).send().await.expect("health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "ok");

    let resp = client.get(url("/health/ready")).send().await.expect("ready");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_product_listing_envelope() {
    let resp = client()
        .get(url("/api/products?limit=5&sort=price_asc"))
        .send()
        .await
        .expect("Failed to list products");
    let body = envelope(resp, StatusCode::OK).await;

    assert_eq!(body["success"], true);
    assert!(body["data"].is_array());
    assert_eq!(body["pagination"]["limit"], 5);
    assert_eq!(body["pagination"]["page"], 1);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_unknown_product_is_404() {
    let resp = client()
        .get(url("/api/products/does-not-exist-anywhere"))
        .send()
        .await
        .expect("Failed to get product");
    let body = envelope(resp, StatusCode::NOT_FOUND).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires a seeded database"]
async fn test_system_categories_are_listed() {
    let resp = client()
        .get(url("/api/categories"))
        .send()
        .await
        .expect("Failed to list categories");
    let body = envelope(resp, StatusCode::OK).await;
    let slugs: Vec<&str> = body["data"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|c| c["slug"].as_str())
        .collect();
    assert!(slugs.contains(&"flower"));
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_register_login_logout() {
    let client = client();
    let user = register_customer(&client, None).await;
    assert_eq!(user["role"], "customer");
    assert_eq!(user["loyalty_points"], 0);
    assert!(user.get("password_hash").is_none());

    let resp = client.get(url("/api/auth/me")).send().await.expect("me");
    let me = envelope(resp, StatusCode::OK).await;
    assert_eq!(me["data"]["email"], user["email"]);

    let resp = client.post(url("/api/auth/logout")).send().await.expect("logout");
    envelope(resp, StatusCode::OK).await;

    let resp = client.get(url("/api/auth/me")).send().await.expect("me");
    let body = envelope(resp, StatusCode::UNAUTHORIZED).await;
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_weak_password_is_rejected() {
    let resp = client()
        .post(url("/api/auth/register"))
        .json(&json!({ "email": unique_email("weak"), "password": "short" }))
        .send()
        .await
        .expect("register");
    let body = envelope(resp, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_duplicate_registration_is_rejected() {
    let email = unique_email("dupe");
    let body = json!({ "email": email, "password": "correct-horse-battery" });

    let resp = client()
        .post(url("/api/auth/register"))
        .json(&body)
        .send()
        .await
        .expect("register");
    envelope(resp, StatusCode::CREATED).await;

    let resp = client()
        .post(url("/api/auth/register"))
        .json(&body)
        .send()
        .await
        .expect("register again");
    envelope(resp, StatusCode::BAD_REQUEST).await;
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_settings_are_public_but_read_only() {
    let client = client();
    for kind in ["shipping", "payment", "navigation", "loyalty"] {
        let resp = client
            .get(url(&format!("/api/settings/{kind}")))
            .send()
            .await
            .expect("settings");
        let body = envelope(resp, StatusCode::OK).await;
        assert!(body["data"].is_object(), "{kind} settings");
    }

    register_customer(&client, None).await;
    let resp = client
        .put(url("/api/settings/shipping"))
        .json(&json!({ "flat_rate": "0" }))
        .send()
        .await
        .expect("put settings");
    let body = envelope(resp, StatusCode::UNAUTHORIZED).await;
    assert_eq!(body["error"], "Unauthorized");
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_quote_rejects_empty_cart() {
    let resp = client()
        .post(url("/api/checkout/quote"))
        .json(&json!({ "items": [] }))
        .send()
        .await
        .expect("quote");
    let body = envelope(resp, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_anonymous_coupon_is_invalid() {
    let resp = client()
        .post(url("/api/checkout/quote"))
        .json(&json!({
            "items": [{ "product_id": 1, "quantity": 1 }],
            "coupon_code": "LOYAL-ABC123"
        }))
        .send()
        .await
        .expect("quote");
    envelope(resp, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_orders_require_sign_in() {
    let resp = client()
        .post(url("/api/orders"))
        .json(&json!({ "items": [{ "product_id": 1, "quantity": 1 }] }))
        .send()
        .await
        .expect("place order");
    envelope(resp, StatusCode::UNAUTHORIZED).await;
}

// ============================================================================
// Loyalty & referrals
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_referral_code_is_stable_and_recorded() {
    let referrer = client();
    register_customer(&referrer, None).await;

    let resp = referrer.get(url("/api/referrals/me")).send().await.expect("me");
    let first = envelope(resp, StatusCode::OK).await;
    let code = first["data"]["referral_code"]
        .as_str()
        .expect("code")
        .to_owned();

    let resp = referrer.get(url("/api/referrals/me")).send().await.expect("me");
    let second = envelope(resp, StatusCode::OK).await;
    assert_eq!(second["data"]["referral_code"], code.as_str());

    let referred = client();
    let user = register_customer(&referred, Some(&code)).await;
    assert!(user["referred_by"].is_number());

    let resp = referrer.get(url("/api/referrals/me")).send().await.expect("me");
    let body = envelope(resp, StatusCode::OK).await;
    let referrals = body["data"]["referrals"].as_array().expect("array");
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0]["status"], "pending");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_loyalty_summary_for_new_customer() {
    let client = client();
    register_customer(&client, None).await;

    let resp = client.get(url("/api/loyalty")).send().await.expect("loyalty");
    let body = envelope(resp, StatusCode::OK).await;
    assert_eq!(body["data"]["points"], 0);
    assert!(body["data"]["rewards"].is_array());

    let resp = client
        .post(url("/api/loyalty/redeem"))
        .json(&json!({ "reward_id": 999_999_999 }))
        .send()
        .await
        .expect("redeem");
    assert!(resp.status().is_client_error());
}
