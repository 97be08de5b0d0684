//! Domain layer for the storefront backend.
//!
//! This crate provides the business services, each constructed around an
//! injected store handle:
//! - `CatalogService` for browsing and administering products
//! - `CartService` for per-user cart mutation with stock validation
//! - `OrderService` for order placement, cancellation and status changes
//! - `AnalyticsService` for the admin dashboard

pub mod access;
pub mod analytics;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod order;

pub use access::Principal;
pub use analytics::{AnalyticsService, Dashboard, LowStockItem, StatusCounts};
pub use cart::{CartItemView, CartService, CartView};
pub use catalog::CatalogService;
pub use error::DomainError;
pub use order::{
    CancelOrder, OrderError, OrderService, OrderStatusView, PlaceOrder, SetOrderStatus,
};
