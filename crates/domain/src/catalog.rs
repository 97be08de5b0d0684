//! Product catalog: public browsing and admin CRUD.

use chrono::Utc;
use common::{Money, Page, PageRequest, ProductId};
use store::{MAX_STOCK, NewProduct, Product, ProductPatch, ProductQuery, ProductStore};

use crate::error::DomainError;

const MAX_NAME_LEN: usize = 200;

fn validate_name(name: &str) -> Result<(), DomainError> {
    let len = name.trim().chars().count();
    if len == 0 || name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "Product name must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_price(price: Money) -> Result<(), DomainError> {
    if !price.is_positive() {
        return Err(DomainError::validation(format!(
            "Invalid price: {} (must be greater than 0)",
            price.cents()
        )));
    }
    Ok(())
}

fn validate_stock(stock: u32) -> Result<(), DomainError> {
    if stock > MAX_STOCK {
        return Err(DomainError::validation(format!(
            "Invalid stock: {stock} (must be at most {MAX_STOCK})"
        )));
    }
    Ok(())
}

/// Service for browsing and managing catalog products.
pub struct CatalogService<S: ProductStore> {
    store: S,
}

impl<S: ProductStore> CatalogService<S> {
    /// Creates a new catalog service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: &ProductQuery,
        page: PageRequest,
    ) -> Result<Page<Product>, DomainError> {
        Ok(self.store.list_products(query, page).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, DomainError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    #[tracing::instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create_product(&self, new: NewProduct) -> Result<Product, DomainError> {
        validate_name(&new.name)?;
        validate_price(new.price)?;
        validate_stock(new.stock)?;

        let product = Product::create(new, Utc::now());
        self.store.insert_product(&product).await?;

        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Applies a partial update. An empty patch is rejected.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, DomainError> {
        if patch.is_empty() {
            return Err(DomainError::validation("No fields to update"));
        }
        if let Some(ref name) = patch.name {
            validate_name(name)?;
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }
        if let Some(stock) = patch.stock {
            validate_stock(stock)?;
        }

        self.store
            .update_product(id, &patch, Utc::now())
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), DomainError> {
        if !self.store.delete_product(id).await? {
            return Err(DomainError::not_found("Product", id));
        }
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}
