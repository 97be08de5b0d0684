//! Admin dashboard aggregates.

use common::{Money, OrderStatus, ProductId};
use store::{OrderStore, ProductStore};

use crate::error::DomainError;

/// Products with stock strictly below this are reported as low.
pub const LOW_STOCK_THRESHOLD: u32 = 10;

/// Maximum number of low-stock products listed on the dashboard.
pub const LOW_STOCK_LIMIT: usize = 10;

/// Order counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.shipped + self.delivered + self.cancelled
    }

    fn slot(&mut self, status: OrderStatus) -> &mut u64 {
        match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::Processing => &mut self.processing,
            OrderStatus::Shipped => &mut self.shipped,
            OrderStatus::Delivered => &mut self.delivered,
            OrderStatus::Cancelled => &mut self.cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowStockItem {
    pub id: ProductId,
    pub name: String,
    pub stock: u32,
}

/// Snapshot of catalog and order health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub total_products: u64,
    pub total_orders: u64,
    pub order_statistics: StatusCounts,
    /// Sum over processing, shipped and delivered orders.
    pub total_revenue: Money,
    pub low_stock_count: usize,
    pub low_stock_items: Vec<LowStockItem>,
}

/// Builds the admin dashboard from store aggregates.
pub struct AnalyticsService<S>
where
    S: ProductStore + OrderStore,
{
    store: S,
}

impl<S> AnalyticsService<S>
where
    S: ProductStore + OrderStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<Dashboard, DomainError> {
        let total_products = self.store.count_products().await?;

        let mut order_statistics = StatusCounts::default();
        for (status, count) in self.store.count_orders_by_status().await? {
            *order_statistics.slot(status) += count;
        }

        let total_revenue = self.store.revenue(&OrderStatus::REVENUE).await?;

        let low_stock_items: Vec<LowStockItem> = self
            .store
            .low_stock_products(LOW_STOCK_THRESHOLD, LOW_STOCK_LIMIT)
            .await?
            .into_iter()
            .map(|p| LowStockItem {
                id: p.id,
                name: p.name,
                stock: p.stock,
            })
            .collect();

        Ok(Dashboard {
            total_products,
            total_orders: order_statistics.total(),
            order_statistics,
            total_revenue,
            low_stock_count: low_stock_items.len(),
            low_stock_items,
        })
    }
}
