//! Route handlers, one module per resource.

/// Transactional bulk create, update and delete
pub mod bulk;
/// Formula CRUD and lookup by ingredient
pub mod formulas;
/// Liveness and database connectivity
pub mod health;
/// Ingredient CRUD
pub mod ingredients;
/// Invoice metadata and PDF upload/download
pub mod invoices;
/// Ingredient substring search and ranked formula search
pub mod search;

use crate::{core::pagination::Pagination, errors::Result};
use serde::Deserialize;

/// `?page=&size=` on listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    /// 1-based page
    pub page: Option<u64>,
    /// Items per page
    pub size: Option<u64>,
}

impl PageParams {
    /// Validated pagination with defaults for missing values.
    pub fn pagination(&self) -> Result<Pagination> {
        Pagination::from_query(self.page, self.size)
    }

    /// Whether the caller asked for a page at all.
    #[must_use]
    pub const fn is_paginated(&self) -> bool {
        self.page.is_some() || self.size.is_some()
    }
}
