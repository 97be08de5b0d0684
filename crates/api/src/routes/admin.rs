//! Admin endpoints: catalog management, order oversight and the dashboard.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, OrderStatus, Page, ProductId};
use domain::{Dashboard, LowStockItem, SetOrderStatus, StatusCounts};
use serde::{Deserialize, Serialize};
use store::{NewProduct, ProductPatch, Store};

use super::orders::OrderResponse;
use super::products::ProductResponse;
use super::{MessageResponse, PageQuery, parse_id};
use crate::AppState;
use crate::auth::AdminCaller;
use crate::error::ApiError;

// -- Request types --

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    pub category: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "empty_object")]
    pub specifications: serde_json::Value,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        NewProduct {
            name: req.name,
            description: req.description,
            price: Money::from_cents(req.price_cents),
            category: req.category,
            stock: req.stock,
            images: req.images,
            specifications: req.specifications,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category: Option<String>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
    pub specifications: Option<serde_json::Value>,
}

impl From<UpdateProductRequest> for ProductPatch {
    fn from(req: UpdateProductRequest) -> Self {
        ProductPatch {
            name: req.name,
            description: req.description,
            price: req.price_cents.map(Money::from_cents),
            category: req.category,
            stock: req.stock,
            images: req.images,
            specifications: req.specifications,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminOrderQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct SetStatusResponse {
    pub message: &'static str,
    pub new_status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusCountsResponse {
    pub pending: u64,
    pub processing: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
}

#[derive(Debug, Serialize)]
pub struct LowStockResponse {
    pub id: ProductId,
    pub name: String,
    pub stock: u32,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_products: u64,
    pub total_orders: u64,
    pub order_statistics: StatusCountsResponse,
    pub total_revenue_cents: i64,
    pub low_stock_count: usize,
    pub low_stock_items: Vec<LowStockResponse>,
}

impl From<StatusCounts> for StatusCountsResponse {
    fn from(c: StatusCounts) -> Self {
        Self {
            pending: c.pending,
            processing: c.processing,
            shipped: c.shipped,
            delivered: c.delivered,
            cancelled: c.cancelled,
        }
    }
}

impl From<LowStockItem> for LowStockResponse {
    fn from(item: LowStockItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            stock: item.stock,
        }
    }
}

impl From<Dashboard> for DashboardResponse {
    fn from(d: Dashboard) -> Self {
        Self {
            total_products: d.total_products,
            total_orders: d.total_orders,
            order_statistics: d.order_statistics.into(),
            total_revenue_cents: d.total_revenue.cents(),
            low_stock_count: d.low_stock_count,
            low_stock_items: d.low_stock_items.into_iter().map(Into::into).collect(),
        }
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid order status: {raw}")))
}

// -- Handlers --

/// POST /admin/products
#[tracing::instrument(skip(state, body))]
pub async fn create_product<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
    body: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let Json(req) = body?;
    let product = state.catalog.create_product(req.into()).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /admin/products/{id}
#[tracing::instrument(skip(state, body))]
pub async fn update_product<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
    Path(id): Path<String>,
    body: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let product = state.catalog.update_product(id, req.into()).await?;
    Ok(Json(product.into()))
}

/// DELETE /admin/products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete_product<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.catalog.delete_product(parse_id(&id)?).await?;
    Ok(Json(MessageResponse {
        message: "Product deleted successfully",
    }))
}

/// GET /admin/orders: all orders, optionally filtered by status.
#[tracing::instrument(skip(state))]
pub async fn list_orders<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
    query: Result<Query<AdminOrderQuery>, QueryRejection>,
) -> Result<Json<Page<OrderResponse>>, ApiError> {
    let Query(params) = query?;
    let status = params.status.as_deref().map(parse_status).transpose()?;
    let page = PageQuery {
        page: params.page,
        limit: params.limit,
    };
    let orders = state
        .orders
        .list_all_orders(status, page.request()?)
        .await?;
    Ok(Json(orders.map(OrderResponse::from)))
}

/// PUT /admin/orders/{id}/status
#[tracing::instrument(skip(state, body))]
pub async fn set_order_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
    Path(id): Path<String>,
    body: Result<Json<SetStatusRequest>, JsonRejection>,
) -> Result<Json<SetStatusResponse>, ApiError> {
    let order_id = parse_id(&id)?;
    let Json(req) = body?;
    let status = parse_status(&req.status)?;

    let order = state
        .orders
        .set_status(SetOrderStatus::new(order_id, status))
        .await?;
    Ok(Json(SetStatusResponse {
        message: "Order status updated successfully",
        new_status: order.status,
    }))
}

/// GET /admin/analytics/dashboard
#[tracing::instrument(skip(state))]
pub async fn dashboard<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
) -> Result<Json<DashboardResponse>, ApiError> {
    let dashboard = state.analytics.dashboard().await?;
    Ok(Json(dashboard.into()))
}
