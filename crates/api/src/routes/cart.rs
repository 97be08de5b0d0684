//! Cart endpoints. All require an authenticated caller.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use domain::{CartItemView, CartView};
use serde::{Deserialize, Serialize};
use store::Store;

use super::{MessageResponse, parse_id};
use crate::AppState;
use crate::auth::Caller;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub image: String,
    pub quantity: u32,
    pub subtotal_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub user_id: UserId,
    pub items: Vec<CartItemResponse>,
    pub total_cents: i64,
    pub item_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<CartItemView> for CartItemResponse {
    fn from(item: CartItemView) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.product_name,
            unit_price_cents: item.unit_price.cents(),
            image: item.image,
            quantity: item.quantity,
            subtotal_cents: item.subtotal.cents(),
        }
    }
}

impl From<CartView> for CartResponse {
    fn from(cart: CartView) -> Self {
        Self {
            user_id: cart.user_id,
            items: cart.items.into_iter().map(Into::into).collect(),
            total_cents: cart.total.cents(),
            item_count: cart.item_count,
            updated_at: cart.updated_at,
        }
    }
}

/// GET /cart
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Caller(principal): Caller,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(principal.user_id).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/items
#[tracing::instrument(skip(state, body))]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Caller(principal): Caller,
    body: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = body?;
    let product_id = parse_id(&req.product_id)?;
    let cart = state
        .carts
        .add_item(principal.user_id, product_id, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// PUT /cart/items/{product_id}
#[tracing::instrument(skip(state, body))]
pub async fn update_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Caller(principal): Caller,
    Path(product_id): Path<String>,
    body: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id = parse_id(&product_id)?;
    let Json(req) = body?;
    let cart = state
        .carts
        .update_item_quantity(principal.user_id, product_id, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/items/{product_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Caller(principal): Caller,
    Path(product_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id = parse_id(&product_id)?;
    let cart = state
        .carts
        .remove_item(principal.user_id, product_id)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Caller(principal): Caller,
) -> Result<Json<MessageResponse>, ApiError> {
    state.carts.clear_cart(principal.user_id).await?;
    Ok(Json(MessageResponse {
        message: "Cart cleared successfully",
    }))
}
