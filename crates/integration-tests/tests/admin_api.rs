//! Integration tests for the back-office API under `/api/admin`.
//!
//! Tests that need an administrator skip themselves unless
//! `CANOPY_TEST_ADMIN_EMAIL` and `CANOPY_TEST_ADMIN_PASSWORD` are set.
//!
//! Run with: cargo test -p canopy-integration-tests -- --ignored

use canopy_integration_tests::{admin_client, client, envelope, register_customer, url};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

fn product_body(name: &str, stock: i32) -> Value {
    json!({
        "name": name,
        "description": "Integration test product",
        "price": "20.00",
        "inventory": { "quantity": stock, "track_inventory": true, "low_stock_threshold": 1 },
        "is_active": true,
    })
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_customers_cannot_reach_admin_routes() {
    let client = client();

    let resp = client
        .get(url("/api/admin/orders"))
        .send()
        .await
        .expect("admin orders");
    envelope(resp, StatusCode::UNAUTHORIZED).await;

    register_customer(&client, None).await;
    for path in ["/api/admin/orders", "/api/admin/users", "/api/admin/products"] {
        let resp = client.get(url(path)).send().await.expect("admin route");
        let body = envelope(resp, StatusCode::UNAUTHORIZED).await;
        assert_eq!(body["error"], "Unauthorized", "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_product_lifecycle() {
    let Some(admin) = admin_client().await else {
        return;
    };
    let name = format!("Test Gummies {}", Uuid::new_v4().simple());

    let resp = admin
        .post(url("/api/admin/products"))
        .json(&product_body(&name, 5))
        .send()
        .await
        .expect("create product");
    let created = envelope(resp, StatusCode::CREATED).await;
    let id = created["data"]["id"].as_i64().expect("id");
    let slug = created["data"]["slug"].as_str().expect("slug").to_owned();
    assert!(slug.starts_with("test-gummies-"));

    let resp = client()
        .get(url(&format!("/api/products/{slug}")))
        .send()
        .await
        .expect("public product");
    let public = envelope(resp, StatusCode::OK).await;
    assert_eq!(public["data"]["name"], name.as_str());

    let resp = admin
        .delete(url(&format!("/api/admin/products/{id}")))
        .send()
        .await
        .expect("delete product");
    let deleted = envelope(resp, StatusCode::OK).await;
    assert_eq!(deleted["data"]["deleted"], true);

    let resp = client()
        .get(url(&format!("/api/products/{slug}")))
        .send()
        .await
        .expect("public product");
    envelope(resp, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_order_placement_and_cancellation_restores_stock() {
    let Some(admin) = admin_client().await else {
        return;
    };
    let name = format!("Test Pre-Roll {}", Uuid::new_v4().simple());
    let resp = admin
        .post(url("/api/admin/products"))
        .json(&product_body(&name, 3))
        .send()
        .await
        .expect("create product");
    let product = envelope(resp, StatusCode::CREATED).await["data"].clone();
    let product_id = product["id"].as_i64().expect("id");

    let customer = client();
    register_customer(&customer, None).await;

    let cart = json!({
        "items": [{ "product_id": product_id, "quantity": 2 }],
        "shipping_method": "pickup",
        "payment_method": "cash_on_pickup",
        "shipping_address": {
            "full_name": "Jamie Doe",
            "line1": "1 Main St",
            "city": "Toronto",
            "province": "ON",
            "postal_code": "M5V 2T6"
        }
    });

    let resp = customer
        .post(url("/api/checkout/quote"))
        .json(&cart)
        .send()
        .await
        .expect("quote");
    let quote = envelope(resp, StatusCode::OK).await;
    assert_eq!(quote["data"]["subtotal"], "40.00");

    let resp = customer
        .post(url("/api/orders"))
        .json(&cart)
        .send()
        .await
        .expect("place order");
    let order = envelope(resp, StatusCode::CREATED).await["data"].clone();
    let order_id = order["id"].as_i64().expect("id");
    assert_eq!(order["status"], "pending");

    let resp = admin
        .get(url(&format!("/api/admin/products/{product_id}")))
        .send()
        .await
        .expect("product");
    assert_eq!(envelope(resp, StatusCode::OK).await["data"]["inventory"]["quantity"], 1);

    let resp = customer
        .post(url("/api/orders"))
        .json(&cart)
        .send()
        .await
        .expect("oversell");
    envelope(resp, StatusCode::BAD_REQUEST).await;

    let resp = admin
        .patch(url(&format!("/api/admin/orders/{order_id}/status")))
        .json(&json!({ "status": "cancelled", "note": "Customer request" }))
        .send()
        .await
        .expect("cancel");
    let cancelled = envelope(resp, StatusCode::OK).await;
    assert_eq!(cancelled["data"]["status"], "cancelled");

    let resp = admin
        .get(url(&format!("/api/admin/products/{product_id}")))
        .send()
        .await
        .expect("product");
    assert_eq!(envelope(resp, StatusCode::OK).await["data"]["inventory"]["quantity"], 3);

    let resp = admin
        .patch(url(&format!("/api/admin/orders/{order_id}/status")))
        .json(&json!({ "status": "processing" }))
        .send()
        .await
        .expect("reopen");
    envelope(resp, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_system_category_cannot_be_deleted() {
    let Some(admin) = admin_client().await else {
        return;
    };
    let resp = admin
        .get(url("/api/admin/categories"))
        .send()
        .await
        .expect("categories");
    let body = envelope(resp, StatusCode::OK).await;
    let Some(system) = body["data"]
        .as_array()
        .expect("array")
        .iter()
        .find(|c| c["is_system"] == true)
        .cloned()
    else {
        return;
    };

    let resp = admin
        .delete(url(&format!("/api/admin/categories/{}", system["id"])))
        .send()
        .await
        .expect("delete category");
    let body = envelope(resp, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "System categories cannot be deleted");
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_settings_round_trip_and_cache_clear() {
    let Some(admin) = admin_client().await else {
        return;
    };
    let resp = admin
        .get(url("/api/settings/navigation"))
        .send()
        .await
        .expect("navigation");
    let current = envelope(resp, StatusCode::OK).await["data"].clone();

    let resp = admin
        .put(url("/api/settings/navigation"))
        .json(&current)
        .send()
        .await
        .expect("put navigation");
    let saved = envelope(resp, StatusCode::OK).await;
    assert_eq!(saved["data"], current);

    let resp = admin
        .post(url("/api/admin/settings/cache/clear"))
        .send()
        .await
        .expect("clear cache");
    envelope(resp, StatusCode::OK).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_points_adjustment() {
    let Some(admin) = admin_client().await else {
        return;
    };
    let customer = client();
    let user = register_customer(&customer, None).await;
    let id = user["id"].as_i64().expect("id");

    let resp = admin
        .post(url(&format!("/api/admin/users/{id}/points")))
        .json(&json!({ "delta": 0 }))
        .send()
        .await
        .expect("zero delta");
    envelope(resp, StatusCode::BAD_REQUEST).await;

    let resp = admin
        .post(url(&format!("/api/admin/users/{id}/points")))
        .json(&json!({ "delta": 250 }))
        .send()
        .await
        .expect("add points");
    let body = envelope(resp, StatusCode::OK).await;
    assert_eq!(body["data"]["loyalty_points"], 250);

    let resp = customer.get(url("/api/loyalty")).send().await.expect("loyalty");
    assert_eq!(envelope(resp, StatusCode::OK).await["data"]["points"], 250);
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_category_cannot_move_under_its_descendant() {
    let Some(admin) = admin_client().await else {
        return;
    };
    let suffix = Uuid::new_v4().simple().to_string();

    let resp = admin
        .post(url("/api/admin/categories"))
        .json(&json!({ "name": format!("Outer {suffix}") }))
        .send()
        .await
        .expect("create outer");
    let outer = envelope(resp, StatusCode::CREATED).await["data"].clone();

    let resp = admin
        .post(url("/api/admin/categories"))
        .json(&json!({ "name": format!("Inner {suffix}"), "parent_id": outer["id"] }))
        .send()
        .await
        .expect("create inner");
    let inner = envelope(resp, StatusCode::CREATED).await["data"].clone();

    let resp = admin
        .put(url(&format!("/api/admin/categories/{}", outer["id"])))
        .json(&json!({ "name": outer["name"], "parent_id": inner["id"] }))
        .send()
        .await
        .expect("move outer under inner");
    let body = envelope(resp, StatusCode::BAD_REQUEST).await;
    assert_eq!(
        body["error"],
        "A category cannot be nested under itself or its descendants"
    );

    let resp = admin
        .put(url(&format!("/api/admin/categories/{}", outer["id"])))
        .json(&json!({ "name": outer["name"], "parent_id": outer["id"] }))
        .send()
        .await
        .expect("move outer under itself");
    envelope(resp, StatusCode::BAD_REQUEST).await;

    for id in [&inner["id"], &outer["id"]] {
        let resp = admin
            .delete(url(&format!("/api/admin/categories/{id}")))
            .send()
            .await
            .expect("delete category");
        envelope(resp, StatusCode::OK).await;
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_malformed_body_is_400_envelope() {
    let Some(admin) = admin_client().await else {
        return;
    };
    let resp = admin
        .put(url("/api/settings/shipping"))
        .json(&json!({ "flat_rate": true }))
        .send()
        .await
        .expect("put shipping");
    let body = envelope(resp, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().expect("message").contains("flat_rate"));
}
