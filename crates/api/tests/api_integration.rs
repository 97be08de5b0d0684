//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::UserId;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let state = api::create_state(InMemoryStore::new());
    api::create_app(state, get_metrics_handle())
}

fn setup_with_state() -> (axum::Router, Arc<api::AppState<InMemoryStore>>) {
    let state = api::create_state(InMemoryStore::new());
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

#[derive(Clone, Copy)]
enum As {
    Anonymous,
    User(UserId),
    Admin(UserId),
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    caller: As,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    match caller {
        As::Anonymous => {}
        As::User(id) => builder = builder.header("x-user-id", id.to_string()),
        As::Admin(id) => {
            builder = builder
                .header("x-user-id", id.to_string())
                .header("x-user-role", "admin")
        }
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create_product(app: &axum::Router, name: &str, price_cents: i64, stock: u32) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/admin/products",
        As::Admin(UserId::new()),
        Some(json!({
            "name": name,
            "description": format!("The {name}"),
            "price_cents": price_cents,
            "category": "Electronics",
            "stock": stock,
            "images": [format!("{name}.png")],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

fn shipping() -> Value {
    json!({
        "shipping_address": {
            "full_name": "Margaret Hamilton",
            "address_line1": "11 Apollo Way",
            "city": "Cambridge",
            "state": "MA",
            "postal_code": "02139",
            "country": "US",
            "phone": "555-0111"
        },
        "payment_method": "credit_card"
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_catalog_browsing() {
    let app = setup();
    create_product(&app, "Speaker", 4_999, 10).await;
    let headphones = create_product(&app, "Headphones", 19_999, 3).await;

    let (status, json) = send(
        &app,
        "GET",
        "/products?sort_by=price&sort_order=desc&limit=1",
        As::Anonymous,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    assert_eq!(json["pages"], 2);
    assert_eq!(json["items"][0]["name"], "Headphones");
    assert_eq!(json["items"][0]["price_cents"], 19_999);

    let (status, json) = send(&app, "GET", "/products/search/speak", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);

    let (status, json) = send(
        &app,
        "GET",
        "/products/category/Electronics",
        As::Anonymous,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);

    let (status, json) = send(
        &app,
        "GET",
        &format!("/products/{headphones}"),
        As::Anonymous,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stock"], 3);
}

#[tokio::test]
async fn test_bad_ids_and_pages_are_bad_requests() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/products/not-a-uuid", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid ID"));

    let (status, _) = send(
        &app,
        "GET",
        &format!("/products/{}", uuid_string()),
        As::Anonymous,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/products?limit=101", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/products?page=0", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/products?sort_by=rating", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn uuid_string() -> String {
    UserId::new().to_string()
}

#[tokio::test]
async fn test_authentication_and_admin_guard() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/cart", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());

    let (status, _) = send(
        &app,
        "GET",
        "/admin/analytics/dashboard",
        As::User(UserId::new()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        "/admin/products",
        As::User(UserId::new()),
        Some(json!({"name": "X", "price_cents": 100, "category": "Y"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cart_flow() {
    let app = setup();
    let speaker = create_product(&app, "Speaker", 5_000, 5).await;
    let user = As::User(UserId::new());

    let (status, json) = send(&app, "GET", "/cart", user, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["item_count"], 0);

    let add = json!({"product_id": speaker, "quantity": 2});
    send(&app, "POST", "/cart/items", user, Some(add.clone())).await;
    let (status, json) = send(&app, "POST", "/cart/items", user, Some(add)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"][0]["quantity"], 4);
    assert_eq!(json["total_cents"], 20_000);
    assert_eq!(json["items"][0]["image"], "Speaker.png");

    let (status, json) = send(
        &app,
        "POST",
        "/cart/items",
        user,
        Some(json!({"product_id": speaker, "quantity": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Insufficient stock")
    );

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/cart/items/{speaker}"),
        user,
        Some(json!({"quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"][0]["quantity"], 1);

    let (status, json) = send(&app, "DELETE", &format!("/cart/items/{speaker}"), user, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["item_count"], 0);

    let (status, json) = send(&app, "DELETE", "/cart", user, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Cart cleared successfully");
}

#[tokio::test]
async fn test_place_and_cancel_order() {
    let (app, state) = setup_with_state();
    let speaker = create_product(&app, "Speaker", 5_000, 5).await;
    let owner = UserId::new();

    send(
        &app,
        "POST",
        "/cart/items",
        As::User(owner),
        Some(json!({"product_id": speaker, "quantity": 3})),
    )
    .await;

    let (status, order) = send(&app, "POST", "/orders", As::User(owner), Some(shipping())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_cents"], 15_000);
    assert_eq!(order["items"][0]["product_name"], "Speaker");
    let order_id = order["id"].as_str().unwrap().to_string();

    let product = state
        .catalog
        .get_product(speaker.parse().unwrap())
        .await
        .unwrap();
    assert_eq!(product.stock, 2);

    let (_, cart) = send(&app, "GET", "/cart", As::User(owner), None).await;
    assert_eq!(cart["item_count"], 0);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/orders/{order_id}"),
        As::User(UserId::new()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(
        &app,
        "GET",
        &format!("/orders/{order_id}/status"),
        As::User(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "pending");

    let (status, json) = send(&app, "GET", "/orders", As::User(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/orders/{order_id}/cancel"),
        As::User(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");

    let product = state
        .catalog
        .get_product(speaker.parse().unwrap())
        .await
        .unwrap();
    assert_eq!(product.stock, 5);

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/orders/{order_id}/cancel"),
        As::User(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Cannot cancel order with status cancelled");
}

#[tokio::test]
async fn test_order_rejections() {
    let app = setup();
    let speaker = create_product(&app, "Speaker", 5_000, 2).await;
    let user = UserId::new();

    let (status, json) = send(&app, "POST", "/orders", As::User(user), Some(shipping())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Cart is empty");

    send(
        &app,
        "POST",
        "/cart/items",
        As::User(user),
        Some(json!({"product_id": speaker, "quantity": 2})),
    )
    .await;

    let mut missing_city = shipping();
    missing_city["shipping_address"]["city"] = json!("");
    let (status, _) = send(&app, "POST", "/orders", As::User(user), Some(missing_city)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/orders",
        As::User(user),
        Some(json!({"payment_method": "card"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(
        &app,
        "DELETE",
        &format!("/admin/products/{speaker}"),
        As::Admin(UserId::new()),
        None,
    )
    .await;
    let (status, _) = send(&app, "POST", "/orders", As::User(user), Some(shipping())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_order_management() {
    let app = setup();
    let admin = As::Admin(UserId::new());
    let speaker = create_product(&app, "Speaker", 5_000, 20).await;
    let user = UserId::new();

    let mut ids = Vec::new();
    for _ in 0..2 {
        send(
            &app,
            "POST",
            "/cart/items",
            As::User(user),
            Some(json!({"product_id": speaker, "quantity": 1})),
        )
        .await;
        let (_, order) = send(&app, "POST", "/orders", As::User(user), Some(shipping())).await;
        ids.push(order["id"].as_str().unwrap().to_string());
    }

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/admin/orders/{}/status", ids[0]),
        admin,
        Some(json!({"status": "delivered"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["new_status"], "delivered");
    assert_eq!(json["message"], "Order status updated successfully");

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/admin/orders/{}/status", ids[1]),
        admin,
        Some(json!({"status": "lost"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, "GET", "/admin/orders?status=delivered", admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["items"][0]["id"], ids[0].as_str());

    let (status, json) = send(&app, "GET", "/admin/orders", admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);

    // Owner can no longer cancel once delivered.
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/orders/{}/cancel", ids[0]),
        As::User(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, "GET", "/admin/analytics/dashboard", admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_products"], 1);
    assert_eq!(json["total_orders"], 2);
    assert_eq!(json["order_statistics"]["delivered"], 1);
    assert_eq!(json["order_statistics"]["pending"], 1);
    assert_eq!(json["total_revenue_cents"], 5_000);
    assert_eq!(json["low_stock_count"], 0);
}

#[tokio::test]
async fn test_admin_product_management() {
    let app = setup();
    let admin = As::Admin(UserId::new());
    let speaker = create_product(&app, "Speaker", 5_000, 20).await;

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/admin/products/{speaker}"),
        admin,
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No fields to update");

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/admin/products/{speaker}"),
        admin,
        Some(json!({"price_cents": 4_500, "stock": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["price_cents"], 4_500);
    assert_eq!(json["stock"], 2);
    assert_eq!(json["name"], "Speaker");

    let (status, _) = send(
        &app,
        "POST",
        "/admin/products",
        admin,
        Some(json!({"name": "Free", "price_cents": 0, "category": "Misc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "DELETE",
        &format!("/admin/products/{speaker}"),
        admin,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Product deleted successfully");

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/admin/products/{speaker}"),
        admin,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_out_of_range_amounts_are_bad_requests() {
    let app = setup();
    let admin = As::Admin(UserId::new());

    let (status, json) = send(
        &app,
        "POST",
        "/admin/products",
        admin,
        Some(json!({
            "name": "Warehouse",
            "price_cents": 100,
            "category": "Misc",
            "stock": 3_000_000_000u32,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Invalid stock"));

    let yacht = create_product(&app, "Yacht", i64::MAX / 2 + 1, 5).await;
    let user = As::User(UserId::new());
    let (status, _) = send(
        &app,
        "POST",
        "/cart/items",
        user,
        Some(json!({"product_id": yacht, "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &app,
        "POST",
        "/cart/items",
        user,
        Some(json!({"product_id": yacht, "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Amount exceeds the supported maximum");

    let (status, json) = send(&app, "GET", "/cart", user, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"][0]["quantity"], 1);
}
