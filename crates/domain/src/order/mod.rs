//! Order placement, cancellation and status changes.

mod commands;
mod service;

pub use commands::*;
pub use service::{OrderService, OrderStatusView};

use common::{OrderStatus, ProductId};
use thiserror::Error;

/// Errors specific to the order flow.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The user's cart is missing or has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A product referenced by the cart no longer exists.
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    /// The order's current status doesn't allow the action.
    #[error("Cannot {action} order with status {current}")]
    InvalidTransition {
        current: OrderStatus,
        action: &'static str,
    },
}
