//! Page/size handling shared by every listing and search.

use crate::errors::{Error, Result};

/// First page when none is requested.
pub const DEFAULT_PAGE: u64 = 1;
/// Page size when none is requested.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u64 = 100;

#[allow(clippy::cast_sign_loss)]
const MAX_OFFSET: u64 = i64::MAX as u64;

/// A validated page request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    size: u64,
}

impl Pagination {
    /// Validates `page >= 1` and `1 <= size <= 100`.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] when either bound is violated.
    pub fn new(page: u64, size: u64) -> Result<Self> {
        if page < 1 {
            return Err(Error::validation("Page number must be at least 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(Error::validation(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, size })
    }

    /// Builds a pagination from optional query values, applying defaults.
    ///
    /// # Errors
    /// Same as [`Pagination::new`].
    pub fn from_query(page: Option<u64>, size: Option<u64>) -> Result<Self> {
        Self::new(
            page.unwrap_or(DEFAULT_PAGE),
            size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }

    /// 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    /// Items per page.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Rows to skip before this page.
    ///
    /// Saturates at `i64::MAX`, the largest OFFSET SQLite accepts, so a
    /// page far past the end yields an empty page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        let offset = (self.page - 1).saturating_mul(self.size);
        if offset > MAX_OFFSET { MAX_OFFSET } else { offset }
    }

    /// Number of pages needed for `total` items.
    #[must_use]
    pub const fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results with the total across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Matching items across every page
    pub total_count: u64,
    /// The request that produced this page
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Number of pages for the total count.
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        self.pagination.page_count(self.total_count)
    }
}
