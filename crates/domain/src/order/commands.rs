//! Order commands.

use common::{OrderId, OrderStatus, UserId};
use store::ShippingAddress;

use crate::error::DomainError;

/// Command to turn a user's cart into an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// The user whose cart is checked out.
    pub user_id: UserId,

    pub shipping_address: ShippingAddress,

    pub payment_method: String,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(
        user_id: UserId,
        shipping_address: ShippingAddress,
        payment_method: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            shipping_address,
            payment_method: payment_method.into(),
        }
    }

    /// Checks that every required field is present and non-blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        let address = &self.shipping_address;
        let required = [
            ("full_name", &address.full_name),
            ("address_line1", &address.address_line1),
            ("city", &address.city),
            ("state", &address.state),
            ("postal_code", &address.postal_code),
            ("country", &address.country),
            ("phone", &address.phone),
            ("payment_method", &self.payment_method),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// Command to cancel an order on behalf of its owner.
#[derive(Debug, Clone, Copy)]
pub struct CancelOrder {
    pub order_id: OrderId,

    /// Must be the order's owner.
    pub requested_by: UserId,
}

impl CancelOrder {
    /// Creates a new CancelOrder command.
    pub fn new(order_id: OrderId, requested_by: UserId) -> Self {
        Self {
            order_id,
            requested_by,
        }
    }
}

/// Admin command to force an order into any status.
#[derive(Debug, Clone, Copy)]
pub struct SetOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl SetOrderStatus {
    /// Creates a new SetOrderStatus command.
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self { order_id, status }
    }
}
