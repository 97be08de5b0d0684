//! Persistence for the storefront: catalog products, carts and orders.
//!
//! The storage traits live in [`store`]; [`InMemoryStore`] backs tests and
//! local runs, [`PostgresStore`] backs production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{
    Money, MoneyOverflow, OrderId, OrderStatus, Page, PageRequest, ProductId, UserId,
};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Cancellation, Cart, CartLine, MAX_STOCK, NewProduct, Order, OrderLine, Product,
    ProductPatch, ShippingAddress, StockLine,
};
pub use postgres::PostgresStore;
pub use query::{OrderQuery, ProductQuery, ProductSort, SortDirection};
pub use store::{CartStore, OrderStore, ProductStore, Store};
