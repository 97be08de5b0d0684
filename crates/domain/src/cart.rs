//! Shopping carts.
//!
//! Every mutation re-checks current stock against the quantity the cart
//! would hold afterwards, not just the delta being added.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId};
use store::{Cart, CartLine, CartStore, Product, ProductStore};

use crate::error::DomainError;

/// One cart line joined with current catalog data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub image: String,
    pub quantity: u32,
    pub subtotal: Money,
}

/// A cart as shown to its owner, priced at current catalog prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub user_id: UserId,
    pub items: Vec<CartItemView>,
    pub total: Money,
    pub item_count: usize,
    pub updated_at: DateTime<Utc>,
}

fn ensure_positive(quantity: u32) -> Result<(), DomainError> {
    if quantity == 0 {
        return Err(DomainError::validation(
            "Invalid quantity: 0 (must be greater than 0)",
        ));
    }
    Ok(())
}

fn ensure_stock(product: &Product, quantity: u32) -> Result<(), DomainError> {
    if product.stock < quantity {
        return Err(DomainError::InsufficientStock {
            product: product.name.clone(),
            requested: quantity,
            available: product.stock,
        });
    }
    Ok(())
}

/// Service for per-user cart operations.
pub struct CartService<S>
where
    S: ProductStore + CartStore,
{
    store: S,
}

impl<S> CartService<S>
where
    S: ProductStore + CartStore,
{
    /// Creates a new cart service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the user's cart, creating an empty one on first access.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView, DomainError> {
        let cart = self.load_or_create(user_id).await?;
        self.view(&cart).await
    }

    /// Adds `quantity` units, merging with an existing line for the product.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, DomainError> {
        ensure_positive(quantity)?;
        let product = self.product(product_id).await?;
        ensure_stock(&product, quantity)?;

        let mut cart = self.load_or_create(user_id).await?;
        match cart.line_mut(product_id) {
            Some(line) => {
                let merged = line.quantity.saturating_add(quantity);
                ensure_stock(&product, merged)?;
                line.quantity = merged;
            }
            None => cart.items.push(CartLine {
                product_id,
                quantity,
            }),
        }
        cart.updated_at = Utc::now();

        // Priced before saving so an unrepresentable total leaves the cart as it was.
        let view = self.view(&cart).await?;
        self.store.save_cart(&cart).await?;
        Ok(view)
    }

    /// Replaces the quantity of a line already in the cart.
    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, DomainError> {
        ensure_positive(quantity)?;
        let mut cart = self.existing(user_id).await?;
        if cart.line(product_id).is_none() {
            return Err(DomainError::not_found("Cart item", product_id));
        }

        let product = self.product(product_id).await?;
        ensure_stock(&product, quantity)?;

        if let Some(line) = cart.line_mut(product_id) {
            line.quantity = quantity;
        }
        cart.updated_at = Utc::now();

        let view = self.view(&cart).await?;
        self.store.save_cart(&cart).await?;
        Ok(view)
    }

    /// Removes a product's line. Removing an absent product is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<CartView, DomainError> {
        let mut cart = self.existing(user_id).await?;
        cart.items.retain(|line| line.product_id != product_id);
        cart.updated_at = Utc::now();
        self.store.save_cart(&cart).await?;

        self.view(&cart).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: UserId) -> Result<(), DomainError> {
        self.store.clear_cart(user_id, Utc::now()).await?;
        Ok(())
    }

    async fn load_or_create(&self, user_id: UserId) -> Result<Cart, DomainError> {
        if let Some(cart) = self.store.get_cart(user_id).await? {
            return Ok(cart);
        }
        let cart = Cart::empty(user_id, Utc::now());
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    async fn existing(&self, user_id: UserId) -> Result<Cart, DomainError> {
        self.store
            .get_cart(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Cart", user_id))
    }

    async fn product(&self, product_id: ProductId) -> Result<Product, DomainError> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", product_id))
    }

    /// Prices the cart. Lines whose product has been deleted are skipped.
    async fn view(&self, cart: &Cart) -> Result<CartView, DomainError> {
        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let Some(product) = self.store.get_product(line.product_id).await? else {
                continue;
            };
            items.push(CartItemView {
                product_id: product.id,
                product_name: product.name.clone(),
                unit_price: product.price,
                image: product.primary_image().to_string(),
                quantity: line.quantity,
                subtotal: product.price.checked_multiply(line.quantity)?,
            });
        }

        Ok(CartView {
            user_id: cart.user_id,
            total: Money::checked_sum(items.iter().map(|item| item.subtotal))?,
            item_count: items.len(),
            items,
            updated_at: cart.updated_at,
        })
    }
}
