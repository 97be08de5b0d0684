//! Records persisted by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, MoneyOverflow, OrderId, OrderStatus, ProductId, UserId};

/// Largest stock level a product may hold; matches the INTEGER column.
pub const MAX_STOCK: u32 = i32::MAX as u32;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category: String,
    /// Units on hand. Unsigned, so it can never go negative.
    pub stock: u32,
    pub images: Vec<String>,
    /// Free-form attributes (brand, model, ...).
    pub specifications: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category: String,
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "empty_object")]
    pub specifications: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Product {
    /// Builds a new product record with a fresh id.
    pub fn create(new: NewProduct, now: DateTime<Utc>) -> Self {
        Self {
            id: ProductId::new(),
            name: new.name,
            description: new.description,
            price: new.price,
            category: new.category,
            stock: new.stock,
            images: new.images,
            specifications: new.specifications,
            created_at: now,
            updated_at: now,
        }
    }

    /// First image, or an empty string when the product has none.
    pub fn primary_image(&self) -> &str {
        self.images.first().map(String::as_str).unwrap_or_default()
    }
}

/// A partial product update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub category: Option<String>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
    pub specifications: Option<serde_json::Value>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category.is_none()
            && self.stock.is_none()
            && self.images.is_none()
            && self.specifications.is_none()
    }

    /// Applies the provided fields to `product` and bumps `updated_at`.
    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(category) = &self.category {
            product.category = category.clone();
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(images) = &self.images {
            product.images = images.clone();
        }
        if let Some(specifications) = &self.specifications {
            product.specifications = specifications.clone();
        }
        product.updated_at = now;
    }
}

/// A (product, quantity) pairing in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A user's shopping cart. Lines keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: UserId,
    pub items: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for a user.
    pub fn empty(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.items.iter().find(|line| line.product_id == product_id)
    }

    pub fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.items
            .iter_mut()
            .find(|line| line.product_id == product_id)
    }
}

/// Shipping address captured on the order at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

/// Snapshot of one purchased product.
///
/// Name and price are copied from the catalog when the order is placed and
/// never follow later catalog edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl OrderLine {
    /// Snapshots `product` at `quantity` units.
    pub fn snapshot(product: &Product, quantity: u32) -> Result<Self, MoneyOverflow> {
        Ok(Self {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.price,
            subtotal: product.price.checked_multiply(quantity)?,
        })
    }
}

/// A placed order. Everything except `status` and `updated_at` is fixed at
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a pending order from line snapshots; the total is their sum.
    pub fn place(
        user_id: UserId,
        items: Vec<OrderLine>,
        shipping_address: ShippingAddress,
        payment_method: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, MoneyOverflow> {
        let total = Money::checked_sum(items.iter().map(|line| line.subtotal))?;
        Ok(Self {
            id: OrderId::new(),
            user_id,
            items,
            total,
            status: OrderStatus::Pending,
            shipping_address,
            payment_method: payment_method.into(),
            created_at: now,
            updated_at: now,
        })
    }

    /// The stock movements this order represents.
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.items
            .iter()
            .map(|line| StockLine::new(line.product_id, line.quantity))
            .collect()
    }
}

/// Outcome of a committed cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    /// The order as persisted, now cancelled.
    pub order: Order,
    /// Lines whose product no longer exists, so nothing was restocked.
    pub missing_products: Vec<ProductId>,
}

/// A stock adjustment for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price_cents: i64, stock: u32) -> Product {
        Product::create(
            NewProduct {
                name: "Widget".to_string(),
                description: "A widget".to_string(),
                price: Money::from_cents(price_cents),
                category: "Tools".to_string(),
                stock,
                images: vec![],
                specifications: empty_object(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_patch_applies_only_provided_fields() {
        let mut p = product(1000, 5);
        let original_name = p.name.clone();
        let patch = ProductPatch {
            price: Some(Money::from_cents(1500)),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        assert!(ProductPatch::default().is_empty());

        let later = p.updated_at + chrono::Duration::seconds(1);
        patch.apply_to(&mut p, later);

        assert_eq!(p.price.cents(), 1500);
        assert_eq!(p.name, original_name);
        assert_eq!(p.stock, 5);
        assert_eq!(p.updated_at, later);
    }

    #[test]
    fn test_order_total_is_sum_of_snapshots() {
        let a = product(1000, 5);
        let b = product(250, 5);
        let lines = vec![
            OrderLine::snapshot(&a, 3).unwrap(),
            OrderLine::snapshot(&b, 2).unwrap(),
        ];
        assert_eq!(lines[0].subtotal.cents(), 3000);

        let address = ShippingAddress {
            full_name: "Ada".to_string(),
            address_line1: "1 Main St".to_string(),
            address_line2: None,
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
            phone: "555-0100".to_string(),
        };
        let order = Order::place(UserId::new(), lines, address, "card", Utc::now()).unwrap();

        assert_eq!(order.total.cents(), 3500);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.created_at, order.updated_at);
        assert_eq!(
            order.stock_lines(),
            vec![StockLine::new(a.id, 3), StockLine::new(b.id, 2)]
        );
    }

    #[test]
    fn test_snapshot_rejects_overflowing_subtotal() {
        let p = product(i64::MAX / 2 + 1, 5);
        assert_eq!(OrderLine::snapshot(&p, 2), Err(MoneyOverflow));
        assert!(OrderLine::snapshot(&p, 1).is_ok());
    }

    #[test]
    fn test_primary_image_defaults_to_empty() {
        let mut p = product(100, 1);
        assert_eq!(p.primary_image(), "");
        p.images = vec!["a.jpg".to_string(), "b.jpg".to_string()];
        assert_eq!(p.primary_image(), "a.jpg");
    }
}
