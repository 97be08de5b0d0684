//! Shared value types for the storefront backend.
//!
//! Identifiers, money, order status and pagination are used by every layer
//! (store, domain and api), so they live here to keep the dependency graph
//! acyclic.

pub mod money;
pub mod page;
pub mod status;
pub mod types;

pub use money::{Money, MoneyOverflow};
pub use page::{Page, PageError, PageRequest};
pub use status::{OrderStatus, ParseStatusError};
pub use types::{OrderId, ProductId, UserId};
