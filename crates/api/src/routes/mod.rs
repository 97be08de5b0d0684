//! HTTP handlers and their request/response types.

pub mod admin;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use std::fmt::Display;
use std::str::FromStr;

use common::PageRequest;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `?page=&limit=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn request(&self) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::from_query(self.page, self.limit)?)
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Parses an identifier from a path or body.
///
/// A malformed id is a 400, never a 404: the reference couldn't be read.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}

