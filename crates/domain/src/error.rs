//! Domain error types.

use common::MoneyOverflow;
use store::StoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The entity is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Bad input shape or range.
    #[error("{0}")]
    Validation(String),

    /// Not enough units on hand for the requested quantity.
    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: u32,
        available: u32,
    },

    /// Ownership or role violation.
    #[error("{0}")]
    Forbidden(String),

    /// An error in the order flow.
    #[error("{0}")]
    Order(OrderError),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}

impl From<MoneyOverflow> for DomainError {
    fn from(_: MoneyOverflow) -> Self {
        DomainError::validation("Amount exceeds the supported maximum")
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product: product_id.to_string(),
                requested,
                available,
            },
            StoreError::ProductNotFound(id) => DomainError::not_found("Product", id),
            other => DomainError::Store(other),
        }
    }
}
