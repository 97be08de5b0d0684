//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a Docker daemon,
//! so they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use store::{
    Cart, CartLine, CartStore, MAX_STOCK, Money, NewProduct, Order, OrderLine, OrderQuery,
    OrderStatus, OrderStore, PageRequest, PostgresStore, Product, ProductId, ProductPatch,
    ProductQuery, ProductSort, ProductStore, ShippingAddress, SortDirection, StockLine,
    StoreError, UserId,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_storefront_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE products, carts, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn product(name: &str, price_cents: i64, stock: u32) -> Product {
    Product::create(
        NewProduct {
            name: name.to_string(),
            description: format!("{name} description"),
            price: Money::from_cents(price_cents),
            category: "Electronics".to_string(),
            stock,
            images: vec![format!("{name}.jpg")],
            specifications: serde_json::json!({"brand": "Acme"}),
        },
        Utc::now(),
    )
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Grace Hopper".to_string(),
        address_line1: "1 Compiler Ct".to_string(),
        address_line2: Some("Suite 2".to_string()),
        city: "Arlington".to_string(),
        state: "VA".to_string(),
        postal_code: "22201".to_string(),
        country: "US".to_string(),
        phone: "555-0199".to_string(),
    }
}

async fn stock_of(store: &PostgresStore, id: ProductId) -> u32 {
    store.get_product(id).await.unwrap().unwrap().stock
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn product_round_trip_and_patch() {
    let store = get_test_store().await;
    let p = product("Laptop", 99_999, 50);
    store.insert_product(&p).await.unwrap();

    let loaded = store.get_product(p.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Laptop");
    assert_eq!(loaded.images, vec!["Laptop.jpg".to_string()]);
    assert_eq!(loaded.specifications["brand"], "Acme");

    let patch = ProductPatch {
        price: Some(Money::from_cents(89_999)),
        images: Some(vec![]),
        ..Default::default()
    };
    let updated = store
        .update_product(p.id, &patch, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.price.cents(), 89_999);
    assert!(updated.images.is_empty());
    assert_eq!(updated.stock, 50);

    assert!(store.delete_product(p.id).await.unwrap());
    assert!(!store.delete_product(p.id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn list_products_filters_and_sorts() {
    let store = get_test_store().await;
    for (name, price) in [("Mouse", 2_500), ("Keyboard", 7_500), ("Monitor", 25_000)] {
        store.insert_product(&product(name, price, 5)).await.unwrap();
    }

    let query = ProductQuery::new()
        .search("mo")
        .sort_by(ProductSort::Price, SortDirection::Desc);
    let page = store
        .list_products(&query, PageRequest::default())
        .await
        .unwrap();
    let names: Vec<_> = page.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Monitor", "Mouse"]);
    assert_eq!(page.total, 2);

    let query = ProductQuery::new().price_between(Some(Money::from_cents(5_000)), None);
    let page = store
        .list_products(&query, PageRequest::new(1, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.pages, 2);
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn reserve_stock_rolls_back_on_failure() {
    let store = get_test_store().await;
    let a = product("A", 100, 5);
    let b = product("B", 100, 1);
    store.insert_product(&a).await.unwrap();
    store.insert_product(&b).await.unwrap();

    let err = store
        .reserve_stock(&[StockLine::new(a.id, 2), StockLine::new(b.id, 3)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock { requested: 3, available: 1, .. }
    ));
    assert_eq!(stock_of(&store, a.id).await, 5);
    assert_eq!(stock_of(&store, b.id).await, 1);

    store
        .reserve_stock(&[StockLine::new(a.id, 5), StockLine::new(b.id, 1)])
        .await
        .unwrap();
    assert_eq!(stock_of(&store, a.id).await, 0);
    assert_eq!(stock_of(&store, b.id).await, 0);

    let missing = store
        .release_stock(&[StockLine::new(a.id, 5), StockLine::new(ProductId::new(), 1)])
        .await
        .unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(stock_of(&store, a.id).await, 5);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn cart_upsert_and_clear() {
    let store = get_test_store().await;
    let user = UserId::new();
    let mut cart = Cart::empty(user, Utc::now());
    cart.items.push(CartLine {
        product_id: ProductId::new(),
        quantity: 2,
    });
    store.save_cart(&cart).await.unwrap();

    cart.items[0].quantity = 4;
    store.save_cart(&cart).await.unwrap();
    let loaded = store.get_cart(user).await.unwrap().unwrap();
    assert_eq!(loaded.items[0].quantity, 4);

    store.clear_cart(user, Utc::now()).await.unwrap();
    assert!(store.get_cart(user).await.unwrap().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn order_status_updates_and_aggregates() {
    let store = get_test_store().await;
    let p = product("A", 1_000, 5);
    let user = UserId::new();
    let order = Order::place(
        user,
        vec![OrderLine::snapshot(&p, 2).unwrap()],
        address(),
        "card",
        Utc::now(),
    )
    .unwrap();
    store.insert_order(&order).await.unwrap();

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.items, order.items);
    assert_eq!(loaded.shipping_address, order.shipping_address);
    assert_eq!(loaded.status, OrderStatus::Pending);

    let updated = store
        .set_order_status(order.id, OrderStatus::Delivered, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Delivered);

    let refused = store
        .cancel_order(order.id, &OrderStatus::CANCELLABLE, Utc::now())
        .await
        .unwrap();
    assert!(refused.is_none());

    let page = store
        .list_orders(&OrderQuery::for_user(user), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let counts = store.count_orders_by_status().await.unwrap();
    assert_eq!(counts.get(&OrderStatus::Delivered), Some(&1));
    assert_eq!(
        store.revenue(&OrderStatus::REVENUE).await.unwrap().cents(),
        2_000
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn cancel_order_restocks_atomically() {
    let store = get_test_store().await;
    let a = product("A", 500, 3);
    let b = product("B", 700, 2);
    store.insert_product(&a).await.unwrap();
    store.insert_product(&b).await.unwrap();
    let order = Order::place(
        UserId::new(),
        vec![
            OrderLine::snapshot(&a, 2).unwrap(),
            OrderLine::snapshot(&b, 1).unwrap(),
        ],
        address(),
        "card",
        Utc::now(),
    )
    .unwrap();
    store.insert_order(&order).await.unwrap();

    // B cannot take its unit back, so neither the status nor A's stock moves.
    store
        .update_product(
            b.id,
            &ProductPatch {
                stock: Some(MAX_STOCK),
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();
    let err = store
        .cancel_order(order.id, &OrderStatus::CANCELLABLE, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::StockOverflow(id) if id == b.id));
    assert_eq!(
        store.get_order(order.id).await.unwrap().unwrap().status,
        OrderStatus::Pending
    );
    assert_eq!(stock_of(&store, a.id).await, 3);

    store
        .update_product(
            b.id,
            &ProductPatch {
                stock: Some(2),
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();
    let cancellation = store
        .cancel_order(order.id, &OrderStatus::CANCELLABLE, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancellation.order.status, OrderStatus::Cancelled);
    assert!(cancellation.missing_products.is_empty());
    assert_eq!(stock_of(&store, a.id).await, 5);
    assert_eq!(stock_of(&store, b.id).await, 3);
}
