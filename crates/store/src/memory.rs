use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::{Cancellation, Cart, MAX_STOCK, Order, Product, ProductPatch, StockLine};
use crate::query::{OrderQuery, ProductQuery, ProductSort, SortDirection};
use crate::store::{CartStore, OrderStore, ProductStore};
use crate::{
    Money, OrderId, OrderStatus, Page, PageRequest, ProductId, Result, StoreError, UserId,
};

/// In-memory store implementation for testing and local runs.
///
/// Provides the same interface and atomicity guarantees as the PostgreSQL
/// implementation: multi-product stock reservation happens under a single
/// write lock.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    carts: Arc<RwLock<HashMap<UserId, Cart>>>,
    /// Insertion order.
    orders: Arc<RwLock<Vec<Order>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

fn paginate<T: Clone>(matching: Vec<T>, page: PageRequest) -> Page<T> {
    let total = matching.len() as u64;
    let items = matching
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    Page::new(items, total, page)
}

fn compare_products(a: &Product, b: &Product, sort: ProductSort) -> Ordering {
    let primary = match sort {
        ProductSort::Price => a.price.cmp(&b.price),
        ProductSort::Name => a.name.cmp(&b.name),
        ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

/// Adds every line back to `products`, all or nothing.
///
/// Lines whose product no longer exists are skipped and their ids returned.
fn restock(
    products: &mut HashMap<ProductId, Product>,
    lines: &[StockLine],
) -> Result<Vec<ProductId>> {
    let mut restocked: HashMap<ProductId, u32> = HashMap::new();
    let mut missing = Vec::new();
    for line in lines {
        let current = match restocked.get(&line.product_id) {
            Some(stock) => *stock,
            None => match products.get(&line.product_id) {
                Some(product) => product.stock,
                None => {
                    missing.push(line.product_id);
                    continue;
                }
            },
        };
        let stock = current
            .checked_add(line.quantity)
            .filter(|stock| *stock <= MAX_STOCK)
            .ok_or(StoreError::StockOverflow(line.product_id))?;
        restocked.insert(line.product_id, stock);
    }

    for (product_id, stock) in restocked {
        if let Some(product) = products.get_mut(&product_id) {
            product.stock = stock;
        }
    }
    Ok(missing)
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        self.products
            .write()
            .await
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list_products(
        &self,
        query: &ProductQuery,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        let products = self.products.read().await;
        let mut matching: Vec<Product> = products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        drop(products);

        matching.sort_by(|a, b| {
            let ord = compare_products(a, b, query.sort);
            match query.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });

        Ok(paginate(matching, page))
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>> {
        let mut products = self.products.write().await;
        Ok(products.get_mut(&id).map(|product| {
            patch.apply_to(product, now);
            product.clone()
        }))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        Ok(self.products.write().await.remove(&id).is_some())
    }

    async fn count_products(&self) -> Result<u64> {
        Ok(self.products.read().await.len() as u64)
    }

    async fn low_stock_products(&self, threshold: u32, limit: usize) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        let mut low: Vec<Product> = products
            .values()
            .filter(|p| p.stock < threshold)
            .cloned()
            .collect();
        low.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
        low.truncate(limit);
        Ok(low)
    }

    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<()> {
        let mut products = self.products.write().await;

        // Work on a scratch copy of the affected counters so a failure on a
        // later line leaves every product untouched.
        let mut remaining: HashMap<ProductId, u32> = HashMap::new();
        for line in lines {
            let available = match remaining.get(&line.product_id) {
                Some(stock) => *stock,
                None => products
                    .get(&line.product_id)
                    .map(|p| p.stock)
                    .ok_or(StoreError::ProductNotFound(line.product_id))?,
            };
            if available < line.quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available,
                });
            }
            remaining.insert(line.product_id, available - line.quantity);
        }

        for (product_id, stock) in remaining {
            if let Some(product) = products.get_mut(&product_id) {
                product.stock = stock;
            }
        }
        Ok(())
    }

    async fn release_stock(&self, lines: &[StockLine]) -> Result<Vec<ProductId>> {
        let mut products = self.products.write().await;
        restock(&mut products, lines)
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(&user_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.carts.write().await.insert(cart.user_id, cart.clone());
        Ok(())
    }

    async fn clear_cart(&self, user_id: UserId, now: DateTime<Utc>) -> Result<()> {
        if let Some(cart) = self.carts.write().await.get_mut(&user_id) {
            cart.items.clear();
            cart.updated_at = now;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        self.orders.write().await.push(order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    async fn list_orders(&self, query: &OrderQuery, page: PageRequest) -> Result<Page<Order>> {
        let orders = self.orders.read().await;
        // Reverse insertion order first so ties on created_at stay newest first.
        let mut matching: Vec<Order> = orders
            .iter()
            .rev()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();
        drop(orders);
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matching, page))
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut orders = self.orders.write().await;
        Ok(orders.iter_mut().find(|o| o.id == id).map(|order| {
            order.status = status;
            order.updated_at = now;
            order.clone()
        }))
    }

    async fn cancel_order(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        now: DateTime<Utc>,
    ) -> Result<Option<Cancellation>> {
        // Orders before products, held together so the status and the
        // restock land as one step.
        let mut orders = self.orders.write().await;
        let Some(order) = orders
            .iter_mut()
            .find(|o| o.id == id && from.contains(&o.status))
        else {
            return Ok(None);
        };

        let mut products = self.products.write().await;
        let missing_products = restock(&mut products, &order.stock_lines())?;
        order.status = OrderStatus::Cancelled;
        order.updated_at = now;

        Ok(Some(Cancellation {
            order: order.clone(),
            missing_products,
        }))
    }

    async fn count_orders_by_status(&self) -> Result<HashMap<OrderStatus, u64>> {
        let orders = self.orders.read().await;
        let mut counts = HashMap::new();
        for order in orders.iter() {
            *counts.entry(order.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn revenue(&self, statuses: &[OrderStatus]) -> Result<Money> {
        let orders = self.orders.read().await;
        Money::checked_sum(
            orders
                .iter()
                .filter(|o| statuses.contains(&o.status))
                .map(|o| o.total),
        )
        .map_err(|e| StoreError::InvalidData(format!("revenue {e}")))
    }
}
