//! Order placement and customer order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, Page, ProductId, UserId};
use domain::{CancelOrder, OrderStatusView, PlaceOrder};
use serde::{Deserialize, Serialize};
use store::{Order, OrderLine, ShippingAddress, Store};

use super::{PageQuery, parse_id};
use crate::AppState;
use crate::auth::Caller;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderLine> for OrderItemResponse {
    fn from(line: OrderLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name,
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            subtotal_cents: line.subtotal.cents(),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            items: order.items.into_iter().map(Into::into).collect(),
            total_cents: order.total.cents(),
            status: order.status,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl From<OrderStatusView> for OrderStatusResponse {
    fn from(view: OrderStatusView) -> Self {
        Self {
            order_id: view.order_id,
            status: view.status,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders: checks out the caller's cart.
#[tracing::instrument(skip(state, body))]
pub async fn place<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Caller(principal): Caller,
    body: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = body?;
    let cmd = PlaceOrder::new(principal.user_id, req.shipping_address, req.payment_method);
    let order = state.orders.place_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Caller(principal): Caller,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<OrderResponse>>, ApiError> {
    let Query(page) = page?;
    let orders = state
        .orders
        .list_orders_for_user(principal.user_id, page.request()?)
        .await?;
    Ok(Json(orders.map(OrderResponse::from)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order(parse_id(&id)?, &principal).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let cmd = CancelOrder::new(parse_id(&id)?, principal.user_id);
    let order = state.orders.cancel_order(cmd).await?;
    Ok(Json(order.into()))
}

/// GET /orders/{id}/status
#[tracing::instrument(skip(state))]
pub async fn status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let view = state.orders.order_status(parse_id(&id)?, &principal).await?;
    Ok(Json(view.into()))
}
