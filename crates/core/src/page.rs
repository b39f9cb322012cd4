//! Pagination primitives shared by every Admin API list endpoint.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_PAGE_NUMBER: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A 1-based page request, sent as `pageNumber` / `pageSize` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page_number: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page_number: u32, page_size: u32) -> CoreResult<Self> {
        if page_number == 0 {
            return Err(CoreError::validation("pageNumber is 1-based"));
        }
        if page_size == 0 {
            return Err(CoreError::validation("pageSize must be positive"));
        }
        Ok(Self {
            page_number,
            page_size,
        })
    }

    pub fn next(self) -> Self {
        Self {
            page_number: self.page_number.saturating_add(1),
            ..self
        }
    }

    /// Query pairs in the order the backends document them.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("pageNumber".to_string(), self.page_number.to_string()),
            ("pageSize".to_string(), self.page_size.to_string()),
        ]
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_number: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Paginated list envelope returned by the Admin API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub total_pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl<T> Paginated<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a page after `current` exists.
    pub fn has_next(&self, current: &PageRequest) -> bool {
        current.page_number < self.total_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            total_pages: self.total_pages,
            page_number: self.page_number,
            page_size: self.page_size,
        }
    }
}
