//! Order placement and order status endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{
    AlbumId, CreateOrder, CustomerId, LineItem, Order, OrderId, OrderService, OrderStatus,
};
use serde::{Deserialize, Serialize};
use store::{CatalogStore, CustomerDirectory};

use crate::Backend;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Backend> {
    pub order_service: OrderService<S, S, S>,
}

impl<S: Backend> AppState<S> {
    pub fn store(&self) -> &S {
        self.order_service.catalog()
    }
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub album_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub total: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub album_id: String,
    pub album_title: Option<String>,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

// -- Handlers --

/// POST /api/orders
///
/// Place an order, reserving stock for every line.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let customer_id: CustomerId = parse_id(&req.customer_id, "customer_id")?;
    let items = req
        .items
        .iter()
        .map(|item| {
            let album_id: AlbumId = parse_id(&item.album_id, "album_id")?;
            Ok(LineItem::new(album_id, item.quantity))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let order = state
        .order_service
        .create_order(CreateOrder::new(customer_id, items))
        .await?;

    let response = to_response(&state, order).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/orders/:id
///
/// Load an order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let order = state.order_service.get_order(order_id).await?;
    Ok(Json(to_response(&state, order).await?))
}

/// GET /api/orders/customer/:customer_id
///
/// A customer's orders, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list_by_customer<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(customer_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let customer_id: CustomerId = parse_id(&customer_id, "customer id")?;
    let orders = state
        .order_service
        .list_orders_by_customer(customer_id)
        .await?;

    let mut responses = Vec::with_capacity(orders.len());
    for order in orders {
        responses.push(to_response(&state, order).await?);
    }
    Ok(Json(responses))
}

/// PUT /api/orders/:id/status?status=SHIPPED
///
/// Set an order's status.
#[tracing::instrument(skip(state))]
pub async fn update_status<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let status: OrderStatus = query
        .status
        .parse()
        .map_err(|e: common::ParseOrderStatusError| ApiError::BadRequest(e.to_string()))?;

    let order = state
        .order_service
        .update_order_status(order_id, status)
        .await?;
    Ok(Json(to_response(&state, order).await?))
}

/// POST /api/orders/:id/cancel
///
/// Cancel an order and return its stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    state.order_service.cancel_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Builds the response, filling in the customer name and album titles.
/// Names of records that have since disappeared are left empty.
async fn to_response<S: Backend>(
    state: &AppState<S>,
    order: Order,
) -> Result<OrderResponse, ApiError> {
    let store = state.store();
    let customer_name = store
        .get_customer(order.customer_id)
        .await?
        .map(|customer| customer.name);

    let mut titles: HashMap<AlbumId, Option<String>> = HashMap::new();
    for item in &order.items {
        if !titles.contains_key(&item.album_id) {
            let title = store
                .get_album(item.album_id)
                .await?
                .map(|album| album.title);
            titles.insert(item.album_id, title);
        }
    }

    let items = order
        .items
        .iter()
        .map(|item| OrderItemResponse {
            id: item.id.to_string(),
            album_id: item.album_id.to_string(),
            album_title: titles.get(&item.album_id).cloned().flatten(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            subtotal_cents: item.subtotal.cents(),
        })
        .collect();

    Ok(OrderResponse {
        id: order.id.to_string(),
        customer_id: order.customer_id.to_string(),
        customer_name,
        status: order.status,
        order_date: order.order_date,
        updated_at: order.updated_at,
        items,
        total_cents: order.total_amount.cents(),
        total: order.total_amount.to_string(),
    })
}

pub(crate) fn parse_id<T: From<uuid::Uuid>>(raw: &str, what: &str) -> Result<T, ApiError> {
    let uuid = uuid::Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))?;
    Ok(T::from(uuid))
}
