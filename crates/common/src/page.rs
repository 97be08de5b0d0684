//! Offset pagination shared by every listing.

use serde::Serialize;
use thiserror::Error;

/// Largest page size a client may request.
pub const MAX_LIMIT: u32 = 100;

/// Page size used when the client does not ask for one.
pub const DEFAULT_LIMIT: u32 = 20;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("page must be at least 1, got {0}")]
    PageOutOfRange(u32),

    #[error("limit must be between 1 and 100, got {0}")]
    LimitOutOfRange(u32),
}

/// A validated (page, limit) pair. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self, PageError> {
        if page < 1 {
            return Err(PageError::PageOutOfRange(page));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(PageError::LimitOutOfRange(limit));
        }
        Ok(Self { page, limit })
    }

    /// Builds a request from optional query-string values, applying defaults.
    pub fn from_query(page: Option<u32>, limit: Option<u32>) -> Result<Self, PageError> {
        Self::new(page.unwrap_or(1), limit.unwrap_or(DEFAULT_LIMIT))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of records to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    /// `ceil(total / limit)`; zero when there are no results.
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            pages: total.div_ceil(u64::from(request.limit)),
        }
    }

    /// Converts the items while keeping the pagination totals.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            pages: self.pages,
        }
    }
}
