//! Public catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::{Money, Page, ProductId};
use serde::{Deserialize, Serialize};
use store::{Product, ProductQuery, ProductSort, SortDirection, Store};

use super::{PageQuery, parse_id};
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub category: String,
    pub stock: u32,
    pub images: Vec<String>,
    pub specifications: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            price_cents: p.price.cents(),
            category: p.category,
            stock: p.stock,
            images: p.images,
            specifications: p.specifications,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ProductListQuery {
    fn to_query(&self) -> Result<ProductQuery, ApiError> {
        let sort: ProductSort = match self.sort_by.as_deref() {
            Some(s) => s.parse().map_err(ApiError::BadRequest)?,
            None => ProductSort::default(),
        };
        let direction: SortDirection = match self.sort_order.as_deref() {
            Some(s) => s.parse().map_err(ApiError::BadRequest)?,
            None => SortDirection::default(),
        };

        let mut query = ProductQuery::new()
            .price_between(
                self.min_price_cents.map(Money::from_cents),
                self.max_price_cents.map(Money::from_cents),
            )
            .sort_by(sort, direction);
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            query = query.category(category);
        }
        if let Some(text) = self.search.as_deref().filter(|s| !s.is_empty()) {
            query = query.search(text);
        }
        Ok(query)
    }
}

async fn page_of<S: Store>(
    state: &AppState<S>,
    query: &ProductQuery,
    page: &PageQuery,
) -> Result<Json<Page<ProductResponse>>, ApiError> {
    let products = state.catalog.list_products(query, page.request()?).await?;
    Ok(Json(products.map(ProductResponse::from)))
}

/// GET /products: filtered, sorted and paginated catalog listing.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<ProductListQuery>, QueryRejection>,
) -> Result<Json<Page<ProductResponse>>, ApiError> {
    let Query(params) = query?;
    let page = PageQuery {
        page: params.page,
        limit: params.limit,
    };
    page_of(&state, &params.to_query()?, &page).await
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.catalog.get_product(parse_id(&id)?).await?;
    Ok(Json(product.into()))
}

/// GET /products/category/{category}
#[tracing::instrument(skip(state))]
pub async fn by_category<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(category): Path<String>,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<ProductResponse>>, ApiError> {
    let Query(page) = page?;
    page_of(&state, &ProductQuery::new().category(category), &page).await
}

/// GET /products/search/{query}
#[tracing::instrument(skip(state))]
pub async fn search<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(text): Path<String>,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<ProductResponse>>, ApiError> {
    let Query(page) = page?;
    page_of(&state, &ProductQuery::new().search(text), &page).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let query = ProductListQuery::default().to_query().unwrap();
        assert_eq!(query.sort, ProductSort::CreatedAt);
        assert_eq!(query.direction, SortDirection::Asc);
        assert!(query.category.is_none());
    }

    #[test]
    fn test_list_query_parses_filters() {
        let params = ProductListQuery {
            category: Some("Audio".to_string()),
            search: Some(String::new()),
            min_price_cents: Some(1_000),
            sort_by: Some("price".to_string()),
            sort_order: Some("desc".to_string()),
            ..Default::default()
        };
        let query = params.to_query().unwrap();
        assert_eq!(query.category.as_deref(), Some("Audio"));
        assert!(query.search.is_none());
        assert_eq!(query.min_price, Some(Money::from_cents(1_000)));
        assert_eq!(query.sort, ProductSort::Price);
        assert_eq!(query.direction, SortDirection::Desc);
    }

    #[test]
    fn test_list_query_rejects_unknown_sort() {
        let params = ProductListQuery {
            sort_by: Some("rating".to_string()),
            ..Default::default()
        };
        assert!(matches!(params.to_query(), Err(ApiError::BadRequest(_))));
    }
}
