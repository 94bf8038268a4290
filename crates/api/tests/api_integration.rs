//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use domain::{Album, AlbumId, Customer, CustomerId, Money, OrderServiceConfig};
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

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
    customer: CustomerId,
    album: AlbumId,
}

/// A shop with one customer and one album priced 19.99 with 10 in stock.
async fn setup() -> TestApp {
    let store = InMemoryStore::new();
    let customer = Customer::new("Ella Fitzgerald", "ella@example.com");
    let album = Album::new("Ella and Louis", Money::from_cents(1999), 10);
    let (customer_id, album_id) = (customer.id, album.id);
    store.insert_customer(customer).await;
    store.insert_album(album).await;

    let state = api::create_state(store.clone(), OrderServiceConfig::default());
    let app = api::create_app(state, get_metrics_handle());

    TestApp {
        app,
        store,
        customer: customer_id,
        album: album_id,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_json(&self, uri: &str, body: Value) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    async fn post_empty(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn put(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Places an order for `quantity` copies of the seeded album and returns its id.
    async fn place_order(&self, quantity: u32) -> String {
        let response = self
            .post_json(
                "/api/orders",
                json!({
                    "customer_id": self.customer.to_string(),
                    "items": [{ "album_id": self.album.to_string(), "quantity": quantity }]
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_order() {
    let app = setup().await;

    let response = app
        .post_json(
            "/api/orders",
            json!({
                "customer_id": app.customer.to_string(),
                "items": [{ "album_id": app.album.to_string(), "quantity": 2 }]
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "PENDING");
    assert_eq!(json["total_cents"], 3998);
    assert_eq!(json["total"], "39.98");
    assert_eq!(json["customer_name"], "Ella Fitzgerald");
    assert_eq!(json["items"][0]["album_title"], "Ella and Louis");
    assert_eq!(json["items"][0]["unit_price_cents"], 1999);
    assert_eq!(json["items"][0]["subtotal_cents"], 3998);
    assert_eq!(app.store.stock_of(app.album).await, Some(8));
}

#[tokio::test]
async fn test_create_and_get_order() {
    let app = setup().await;
    let order_id = app.place_order(1).await;

    let response = app.get(&format!("/api/orders/{order_id}")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], order_id.as_str());
    assert_eq!(json["customer_id"], app.customer.to_string());
    assert_eq!(json["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup().await;

    let response = app
        .get(&format!("/api/orders/{}", domain::OrderId::new()))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Order not found"));
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let app = setup().await;

    let response = app.get("/api/orders/not-a-uuid").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_insufficient_stock_is_bad_request() {
    let app = setup().await;

    let response = app
        .post_json(
            "/api/orders",
            json!({
                "customer_id": app.customer.to_string(),
                "items": [{ "album_id": app.album.to_string(), "quantity": 11 }]
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    let message = json["error"].as_str().unwrap();
    assert!(message.contains("Available: 10, Requested: 11"));
    assert_eq!(app.store.stock_of(app.album).await, Some(10));
}

#[tokio::test]
async fn test_empty_order_is_rejected() {
    let app = setup().await;

    let response = app
        .post_json(
            "/api/orders",
            json!({ "customer_id": app.customer.to_string(), "items": [] }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Order must contain at least one item")
    );
}

#[tokio::test]
async fn test_unknown_customer_is_not_found() {
    let app = setup().await;

    let response = app
        .post_json(
            "/api/orders",
            json!({
                "customer_id": CustomerId::new().to_string(),
                "items": [{ "album_id": app.album.to_string(), "quantity": 1 }]
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_order_with_invalid_customer_id() {
    let app = setup().await;

    let response = app
        .post_json(
            "/api/orders",
            json!({
                "customer_id": "bogus",
                "items": [{ "album_id": app.album.to_string(), "quantity": 1 }]
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Invalid customer_id"));
}

#[tokio::test]
async fn test_list_orders_by_customer() {
    let app = setup().await;
    let first = app.place_order(1).await;
    let second = app.place_order(2).await;

    let response = app
        .get(&format!("/api/orders/customer/{}", app.customer))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![first.as_str(), second.as_str()]);
}

#[tokio::test]
async fn test_update_status() {
    let app = setup().await;
    let order_id = app.place_order(1).await;

    let response = app
        .put(&format!("/api/orders/{order_id}/status?status=SHIPPED"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "SHIPPED");
}

#[tokio::test]
async fn test_update_status_accepts_lower_case() {
    let app = setup().await;
    let order_id = app.place_order(1).await;

    let response = app
        .put(&format!("/api/orders/{order_id}/status?status=processing"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "PROCESSING");
}

#[tokio::test]
async fn test_update_status_unknown_value() {
    let app = setup().await;
    let order_id = app.place_order(1).await;

    let response = app
        .put(&format!("/api/orders/{order_id}/status?status=LOST"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_delivered_order_conflicts() {
    let app = setup().await;
    let order_id = app.place_order(1).await;
    app.put(&format!("/api/orders/{order_id}/status?status=DELIVERED"))
        .await;

    let response = app
        .put(&format!("/api/orders/{order_id}/status?status=PENDING"))
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_order_restores_stock() {
    let app = setup().await;
    let order_id = app.place_order(3).await;
    assert_eq!(app.store.stock_of(app.album).await, Some(7));

    let response = app
        .post_empty(&format!("/api/orders/{order_id}/cancel"))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.store.stock_of(app.album).await, Some(10));

    let again = app
        .post_empty(&format!("/api/orders/{order_id}/cancel"))
        .await;
    assert_eq!(again.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.store.stock_of(app.album).await, Some(10));

    let json = body_json(app.get(&format!("/api/orders/{order_id}")).await).await;
    assert_eq!(json["status"], "CANCELLED");
}

#[tokio::test]
async fn test_cancel_shipped_order_conflicts() {
    let app = setup().await;
    let order_id = app.place_order(1).await;
    app.put(&format!("/api/orders/{order_id}/status?status=SHIPPED"))
        .await;

    let response = app
        .post_empty(&format!("/api/orders/{order_id}/cancel"))
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.store.stock_of(app.album).await, Some(9));
}

#[tokio::test]
async fn test_get_album_shows_stock() {
    let app = setup().await;
    app.place_order(4).await;

    let response = app.get(&format!("/api/albums/{}", app.album)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["title"], "Ella and Louis");
    assert_eq!(json["price"], "19.99");
    assert_eq!(json["stock_quantity"], 6);
}

#[tokio::test]
async fn test_get_unknown_album() {
    let app = setup().await;

    let response = app.get(&format!("/api/albums/{}", AlbumId::new())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup().await;
    app.place_order(1).await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}
