use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Cancellation, Cart, Order, Product, ProductPatch, StockLine};
use crate::query::{OrderQuery, ProductQuery};
use crate::{Money, OrderId, OrderStatus, Page, PageRequest, ProductId, Result, UserId};

/// Catalog persistence.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert_product(&self, product: &Product) -> Result<()>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products matching `query`, one page at a time.
    async fn list_products(&self, query: &ProductQuery, page: PageRequest)
    -> Result<Page<Product>>;

    /// Applies a partial update in a single store operation.
    ///
    /// Fields not named in the patch (stock in particular) are never written,
    /// so a concurrent stock adjustment is not lost. Returns None if the
    /// product doesn't exist.
    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>>;

    /// Deletes a product. Returns false if it didn't exist.
    async fn delete_product(&self, id: ProductId) -> Result<bool>;

    async fn count_products(&self) -> Result<u64>;

    /// Products with stock strictly below `threshold`, lowest stock first.
    async fn low_stock_products(&self, threshold: u32, limit: usize) -> Result<Vec<Product>>;

    /// Decrements stock for every line, all or nothing.
    ///
    /// Each decrement is conditional (only if stock >= quantity). If any line
    /// cannot be satisfied, no product is changed and the call fails with
    /// `InsufficientStock` or `ProductNotFound` for the first failing line.
    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<()>;

    /// Adds stock back for every line.
    ///
    /// Lines whose product no longer exists are skipped; their ids are
    /// returned so the caller can report the inconsistency.
    async fn release_stock(&self, lines: &[StockLine]) -> Result<Vec<ProductId>>;
}

/// Cart persistence. One cart per user.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>>;

    /// Inserts or replaces the user's cart.
    async fn save_cart(&self, cart: &Cart) -> Result<()>;

    /// Empties the user's cart. A missing cart is left missing.
    async fn clear_cart(&self, user_id: UserId, now: DateTime<Utc>) -> Result<()>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<()>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders matching `query`, newest first.
    async fn list_orders(&self, query: &OrderQuery, page: PageRequest) -> Result<Page<Order>>;

    /// Sets the status unconditionally. Returns None if the order doesn't exist.
    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>>;

    /// Cancels the order and restocks its lines as one atomic step.
    ///
    /// Applies only if the current status is one of `from`; returns None if
    /// the order doesn't exist or its status didn't match. If restocking
    /// fails, the status change is not kept either.
    async fn cancel_order(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        now: DateTime<Utc>,
    ) -> Result<Option<Cancellation>>;

    /// Number of orders per status. Statuses with no orders may be absent.
    async fn count_orders_by_status(&self) -> Result<HashMap<OrderStatus, u64>>;

    /// Sum of order totals over the given statuses.
    async fn revenue(&self, statuses: &[OrderStatus]) -> Result<Money>;
}

/// Everything the services need from a backing store.
pub trait Store: ProductStore + CartStore + OrderStore + Clone + 'static {}

impl<T> Store for T where T: ProductStore + CartStore + OrderStore + Clone + 'static {}
