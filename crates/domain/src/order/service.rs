//! Order service: checkout, cancellation and order reads.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, Page, PageRequest, UserId};
use store::{
    CartStore, Order, OrderLine, OrderQuery, OrderStore, ProductStore, Store, StoreError,
};

use crate::access::Principal;
use crate::error::DomainError;

use super::{CancelOrder, OrderError, PlaceOrder, SetOrderStatus};

/// Status summary of an order, for polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStatusView {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Service for managing orders.
///
/// Stock moves only through the store's conditional operations, so
/// concurrent checkouts and cancellations never drive stock negative or
/// restore it twice.
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order from the user's cart.
    ///
    /// On success the order is persisted as pending, stock is decremented for
    /// every line and the cart is emptied. On failure nothing changes.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        let started = Instant::now();
        let result = self.try_place_order(cmd).await;
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(order_id = %order.id, total = %order.total, "order placed");
            }
            Err(e) => {
                metrics::counter!("order_placement_failed_total").increment(1);
                tracing::warn!(error = %e, "order placement failed");
            }
        }
        result
    }

    async fn try_place_order(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        cmd.validate()?;

        let cart = match self.store.get_cart(cmd.user_id).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(OrderError::EmptyCart.into()),
        };

        // Snapshot every line at current catalog values.
        let mut lines = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let product = self
                .store
                .get_product(item.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound {
                    product_id: item.product_id,
                })?;

            if product.stock < item.quantity {
                return Err(DomainError::InsufficientStock {
                    product: product.name,
                    requested: item.quantity,
                    available: product.stock,
                });
            }
            lines.push(OrderLine::snapshot(&product, item.quantity)?);
        }

        let now = Utc::now();
        let order = Order::place(
            cmd.user_id,
            lines,
            cmd.shipping_address,
            cmd.payment_method,
            now,
        )?;
        let stock_lines = order.stock_lines();

        // Stock may have moved since the snapshot; the store re-checks.
        if let Err(e) = self.store.reserve_stock(&stock_lines).await {
            return Err(reservation_error(&order, e));
        }

        if let Err(e) = self.store.insert_order(&order).await {
            tracing::warn!(order_id = %order.id, error = %e, "order write failed, releasing stock");
            if let Err(release) = self.store.release_stock(&stock_lines).await {
                tracing::error!(order_id = %order.id, error = %release, "stock release failed");
            }
            return Err(e.into());
        }

        if let Err(e) = self.store.clear_cart(cmd.user_id, now).await {
            tracing::error!(order_id = %order.id, error = %e, "failed to clear cart after order");
        }

        Ok(order)
    }

    /// Cancels a pending or processing order and restores its stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, cmd: CancelOrder) -> Result<Order, DomainError> {
        let order = self.load(cmd.order_id).await?;

        if order.user_id != cmd.requested_by {
            return Err(DomainError::Forbidden(
                "Not authorized to cancel this order".to_string(),
            ));
        }
        if !order.status.can_cancel() {
            return Err(invalid_cancel(order.status));
        }

        // Status change and restock commit together.
        let cancellation = match self
            .store
            .cancel_order(cmd.order_id, &OrderStatus::CANCELLABLE, Utc::now())
            .await?
        {
            Some(cancellation) => cancellation,
            None => {
                // Lost a race with another status change.
                let current = self.load(cmd.order_id).await?;
                return Err(invalid_cancel(current.status));
            }
        };
        let cancelled = cancellation.order;

        for product_id in cancellation.missing_products {
            metrics::counter!("stock_restore_missing_product_total").increment(1);
            tracing::warn!(
                order_id = %cancelled.id,
                %product_id,
                "product no longer exists, stock not restored"
            );
        }

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %cancelled.id, "order cancelled");
        Ok(cancelled)
    }

    /// Forces an order into any status. Stock is not touched.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(&self, cmd: SetOrderStatus) -> Result<Order, DomainError> {
        let order = self
            .store
            .set_order_status(cmd.order_id, cmd.status, Utc::now())
            .await?
            .ok_or_else(|| DomainError::not_found("Order", cmd.order_id))?;

        tracing::info!(order_id = %order.id, status = %order.status, "order status set");
        Ok(order)
    }

    /// Loads an order visible to `principal`.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: OrderId,
        principal: &Principal,
    ) -> Result<Order, DomainError> {
        let order = self.load(order_id).await?;
        if !principal.can_read(order.user_id) {
            return Err(DomainError::Forbidden(
                "Not authorized to access this order".to_string(),
            ));
        }
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn order_status(
        &self,
        order_id: OrderId,
        principal: &Principal,
    ) -> Result<OrderStatusView, DomainError> {
        let order = self.get_order(order_id, principal).await?;
        Ok(OrderStatusView {
            order_id: order.id,
            status: order.status,
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }

    /// The user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>, DomainError> {
        Ok(self
            .store
            .list_orders(&OrderQuery::for_user(user_id), page)
            .await?)
    }

    /// All orders, newest first, optionally narrowed to one status.
    #[tracing::instrument(skip(self))]
    pub async fn list_all_orders(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, DomainError> {
        Ok(self
            .store
            .list_orders(&OrderQuery::all(status), page)
            .await?)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }
}

fn invalid_cancel(current: OrderStatus) -> DomainError {
    OrderError::InvalidTransition {
        current,
        action: "cancel",
    }
    .into()
}

/// Maps a failed reservation onto the order's own product names.
fn reservation_error(order: &Order, e: StoreError) -> DomainError {
    match e {
        StoreError::InsufficientStock {
            product_id,
            requested,
            available,
        } => {
            let product = order
                .items
                .iter()
                .find(|line| line.product_id == product_id)
                .map(|line| line.product_name.clone())
                .unwrap_or_else(|| product_id.to_string());
            DomainError::InsufficientStock {
                product,
                requested,
                available,
            }
        }
        StoreError::ProductNotFound(product_id) => {
            OrderError::ProductNotFound { product_id }.into()
        }
        other => other.into(),
    }
}
