use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use uuid::Uuid;

use crate::model::{
    Cancellation, Cart, CartLine, MAX_STOCK, Order, OrderLine, Product, ProductPatch, StockLine,
};
use crate::query::{OrderQuery, ProductQuery, ProductSort, SortDirection};
use crate::store::{CartStore, OrderStore, ProductStore};
use crate::{
    Money, OrderId, OrderStatus, Page, PageRequest, ProductId, Result, StoreError, UserId,
};

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, category, stock, images, specifications, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, user_id, items, total_cents, status, shipping_address, payment_method, created_at, updated_at";

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let images: serde_json::Value = row.try_get("images")?;

        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            category: row.try_get("category")?,
            stock: from_db_quantity(row.try_get("stock")?)?,
            images: serde_json::from_value(images)?,
            specifications: row.try_get("specifications")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_cart(row: PgRow) -> Result<Cart> {
        let items: serde_json::Value = row.try_get("items")?;

        Ok(Cart {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            items: serde_json::from_value::<Vec<CartLine>>(items)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let items: serde_json::Value = row.try_get("items")?;
        let address: serde_json::Value = row.try_get("shipping_address")?;
        let status: String = row.try_get("status")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            items: serde_json::from_value::<Vec<OrderLine>>(items)?,
            total: Money::from_cents(row.try_get("total_cents")?),
            status: status
                .parse()
                .map_err(|e: common::ParseStatusError| StoreError::InvalidData(e.to_string()))?,
            shipping_address: serde_json::from_value(address)?,
            payment_method: row.try_get("payment_method")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Builds the WHERE clause for a product query, numbering parameters
    /// from `$1`. Must stay in step with [`bind_product_filter`].
    fn product_filter_sql(query: &ProductQuery) -> (String, usize) {
        let mut sql = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if query.category.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND category = ${param_count}"));
        }
        if query.search.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND (name ILIKE ${param_count} ESCAPE '\\' OR description ILIKE ${param_count} ESCAPE '\\')"
            ));
        }
        if query.min_price.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND price_cents >= ${param_count}"));
        }
        if query.max_price.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND price_cents <= ${param_count}"));
        }

        (sql, param_count)
    }

    fn order_filter_sql(query: &OrderQuery) -> (String, usize) {
        let mut sql = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }

        (sql, param_count)
    }
}

fn bind_product_filter<'q>(mut q: PgQuery<'q>, query: &ProductQuery) -> PgQuery<'q> {
    if let Some(ref category) = query.category {
        q = q.bind(category.clone());
    }
    if let Some(ref search) = query.search {
        q = q.bind(format!("%{}%", escape_like(search)));
    }
    if let Some(min) = query.min_price {
        q = q.bind(min.cents());
    }
    if let Some(max) = query.max_price {
        q = q.bind(max.cents());
    }
    q
}

fn bind_order_filter<'q>(mut q: PgQuery<'q>, query: &OrderQuery) -> PgQuery<'q> {
    if let Some(user_id) = query.user_id {
        q = q.bind(user_id.as_uuid());
    }
    if let Some(status) = query.status {
        q = q.bind(status.as_str());
    }
    q
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn to_db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::InvalidData(format!("quantity {quantity} out of range")))
}

fn from_db_quantity(value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("negative stock value {value}")))
}

/// Adds every line back on `conn`, which must be inside a transaction.
///
/// Lines whose product no longer exists are skipped and their ids returned.
async fn restock(conn: &mut PgConnection, lines: &[StockLine]) -> Result<Vec<ProductId>> {
    let mut missing = Vec::new();

    for line in lines {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $2 WHERE id = $1 AND stock <= $3 - $2",
        )
        .bind(line.product_id.as_uuid())
        .bind(to_db_quantity(line.quantity)?)
        .bind(to_db_quantity(MAX_STOCK)?)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                    .bind(line.product_id.as_uuid())
                    .fetch_one(&mut *conn)
                    .await?;
            if exists {
                return Err(StoreError::StockOverflow(line.product_id));
            }
            missing.push(line.product_id);
        }
    }

    Ok(missing)
}

fn status_strings(statuses: &[OrderStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, category, stock, images, specifications, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.category)
        .bind(to_db_quantity(product.stock)?)
        .bind(serde_json::to_value(&product.images)?)
        .bind(&product.specifications)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list_products(
        &self,
        query: &ProductQuery,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        let (filter, param_count) = Self::product_filter_sql(query);

        let count_sql = format!("SELECT COUNT(*) FROM products{filter}");
        let total: i64 = bind_product_filter(sqlx::query(&count_sql), query)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;

        let column = match query.sort {
            ProductSort::Price => "price_cents",
            ProductSort::Name => "name",
            ProductSort::CreatedAt => "created_at",
        };
        let direction = match query.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let select_sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products{filter} ORDER BY {column} {direction}, id {direction} LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );

        let rows = bind_product_filter(sqlx::query(&select_sql), query)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(Self::row_to_product)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>> {
        // $1 = id, $2 = updated_at, then one parameter per provided field.
        let mut sql = String::from("UPDATE products SET updated_at = $2");
        let mut param_count = 2;
        let mut push = |column: &str| {
            param_count += 1;
            sql.push_str(&format!(", {column} = ${param_count}"));
        };

        if patch.name.is_some() {
            push("name");
        }
        if patch.description.is_some() {
            push("description");
        }
        if patch.price.is_some() {
            push("price_cents");
        }
        if patch.category.is_some() {
            push("category");
        }
        if patch.stock.is_some() {
            push("stock");
        }
        if patch.images.is_some() {
            push("images");
        }
        if patch.specifications.is_some() {
            push("specifications");
        }
        sql.push_str(&format!(" WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"));

        let mut q = sqlx::query(&sql).bind(id.as_uuid()).bind(now);
        if let Some(ref name) = patch.name {
            q = q.bind(name.clone());
        }
        if let Some(ref description) = patch.description {
            q = q.bind(description.clone());
        }
        if let Some(price) = patch.price {
            q = q.bind(price.cents());
        }
        if let Some(ref category) = patch.category {
            q = q.bind(category.clone());
        }
        if let Some(stock) = patch.stock {
            q = q.bind(to_db_quantity(stock)?);
        }
        if let Some(ref images) = patch.images {
            q = q.bind(serde_json::to_value(images)?);
        }
        if let Some(ref specifications) = patch.specifications {
            q = q.bind(specifications.clone());
        }

        let row = q.fetch_optional(&self.pool).await?;
        row.map(Self::row_to_product).transpose()
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_products(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn low_stock_products(&self, threshold: u32, limit: usize) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE stock < $1 ORDER BY stock ASC, name ASC LIMIT $2"
        ))
        .bind(i64::from(threshold))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for line in lines {
            let quantity = to_db_quantity(line.quantity)?;

            // Conditional decrement: never takes stock below zero.
            let result = sqlx::query(
                "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
            )
            .bind(line.product_id.as_uuid())
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                        .bind(line.product_id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?;
                tx.rollback().await?;
                tracing::debug!(product_id = %line.product_id, "stock reservation rolled back");

                return Err(match available {
                    None => StoreError::ProductNotFound(line.product_id),
                    Some(available) => StoreError::InsufficientStock {
                        product_id: line.product_id,
                        requested: line.quantity,
                        available: from_db_quantity(available)?,
                    },
                });
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn release_stock(&self, lines: &[StockLine]) -> Result<Vec<ProductId>> {
        let mut tx = self.pool.begin().await?;
        let missing = restock(&mut *tx, lines).await?;
        tx.commit().await?;
        Ok(missing)
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query(
            "SELECT user_id, items, created_at, updated_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart).transpose()
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (user_id, items, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                items = EXCLUDED.items,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cart.user_id.as_uuid())
        .bind(serde_json::to_value(&cart.items)?)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_cart(&self, user_id: UserId, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE carts SET items = '[]'::jsonb, updated_at = $2 WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, items, total_cents, status, shipping_address, payment_method, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(serde_json::to_value(&order.items)?)
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(serde_json::to_value(&order.shipping_address)?)
        .bind(&order.payment_method)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders(&self, query: &OrderQuery, page: PageRequest) -> Result<Page<Order>> {
        let (filter, param_count) = Self::order_filter_sql(query);

        let count_sql = format!("SELECT COUNT(*) FROM orders{filter}");
        let total: i64 = bind_order_filter(sqlx::query(&count_sql), query)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;

        let select_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{filter} ORDER BY created_at DESC, id DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let rows = bind_order_filter(sqlx::query(&select_sql), query)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn cancel_order(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        now: DateTime<Utc>,
    ) -> Result<Option<Cancellation>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 AND status = ANY($4) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(OrderStatus::Cancelled.as_str())
        .bind(now)
        .bind(status_strings(from))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = Self::row_to_order(row)?;

        // Dropping the transaction on error rolls the status back too.
        let missing_products = restock(&mut *tx, &order.stock_lines()).await?;
        tx.commit().await?;

        Ok(Some(Cancellation {
            order,
            missing_products,
        }))
    }

    async fn count_orders_by_status(&self) -> Result<HashMap<OrderStatus, u64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM orders GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = HashMap::new();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            let status = status
                .parse()
                .map_err(|e: common::ParseStatusError| StoreError::InvalidData(e.to_string()))?;
            counts.insert(status, count as u64);
        }
        Ok(counts)
    }

    async fn revenue(&self, statuses: &[OrderStatus]) -> Result<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_cents), 0)::BIGINT FROM orders WHERE status = ANY($1)",
        )
        .bind(status_strings(statuses))
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }
}
