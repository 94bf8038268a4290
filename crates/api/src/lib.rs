//! HTTP API server with observability for the record shop order workflow.
//!
//! Provides REST endpoints for placing, reading, updating and cancelling
//! orders, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{OrderService, OrderServiceConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CatalogStore, CustomerDirectory, OrderLedger};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// A store that can serve as catalog, customer directory and order ledger
/// at once, which both the in-memory and PostgreSQL stores do.
pub trait Backend: CatalogStore + CustomerDirectory + OrderLedger + Clone + 'static {}

impl<T> Backend for T where T: CatalogStore + CustomerDirectory + OrderLedger + Clone + 'static {}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Backend>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route("/api/orders", post(routes::orders::create::<S>))
        .route("/api/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/api/orders/customer/{customer_id}",
            get(routes::orders::list_by_customer::<S>),
        )
        .route(
            "/api/orders/{id}/status",
            put(routes::orders::update_status::<S>),
        )
        .route("/api/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/api/albums/{id}", get(routes::albums::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a single store acting as all three
/// collaborators.
pub fn create_state<S: Backend>(store: S, config: OrderServiceConfig) -> Arc<AppState<S>> {
    let order_service = OrderService::with_config(store.clone(), store.clone(), store, config);
    Arc::new(AppState { order_service })
}

/// Registers descriptions for the order workflow metrics.
pub fn describe_metrics() {
    metrics::describe_counter!("orders_created_total", "Orders placed successfully");
    metrics::describe_counter!(
        "order_create_failures_total",
        "Order placements rejected, by reason"
    );
    metrics::describe_counter!("orders_cancelled_total", "Orders cancelled");
    metrics::describe_counter!("order_status_updates_total", "Order status changes applied");
    metrics::describe_counter!(
        "stock_update_conflicts_total",
        "Conditional stock writes that lost a race and were retried"
    );
    metrics::describe_counter!(
        "stock_compensation_failures_total",
        "Compensating stock or status writes that failed"
    );
    metrics::describe_histogram!(
        "order_create_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent placing an order"
    );
}
