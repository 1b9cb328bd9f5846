//! Windowed pagination

use serde::{Deserialize, Serialize};

use crate::query::StoreQuery;

/// Rows to skip and take
///
/// # Example
///
/// ```rust
/// use acton_repository::query::Window;
///
/// let page3 = Window::page(3, 20);
/// assert_eq!(page3.offset, 40);
/// assert_eq!(page3.limit, 20);
///
/// // page 0 behaves as page 1
/// assert_eq!(Window::page(0, 20).offset, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Number of rows to skip
    pub offset: u64,
    /// Maximum number of rows to return
    pub limit: u64,
}

impl Window {
    /// Create a window from raw offset and limit
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Window for a 1-based page number
    #[must_use]
    pub const fn page(page_number: u32, page_size: u32) -> Self {
        let offset = (page_number.saturating_sub(1) as u64) * page_size as u64;
        Self {
            offset,
            limit: page_size as u64,
        }
    }
}

/// One page of projected records
///
/// Serialises as `{ totalCount, hasNext, hasPrevious, pageNumber, pageSize, items }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<M> {
    total_count: u64,
    has_next: bool,
    has_previous: bool,
    page_number: u32,
    page_size: u32,
    items: Vec<M>,
}

impl<M> PageResult<M> {
    /// Records matching the query across all pages
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Whether a following page holds records
    pub fn has_next(&self) -> bool {
        self.has_next
    }

    /// Whether this is not the first page
    pub fn has_previous(&self) -> bool {
        self.has_previous
    }

    /// 1-based page number
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Requested page size
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Records on this page
    pub fn items(&self) -> &[M] {
        &self.items
    }

    /// Take the records out
    pub fn into_items(self) -> Vec<M> {
        self.items
    }
}

/// Applies windows and assembles page results
pub struct Paginator;

impl Paginator {
    /// Restrict `query` to the given page
    pub fn window(query: StoreQuery, page_number: u32, page_size: u32) -> StoreQuery {
        query.windowed(Window::page(page_number, page_size))
    }

    /// Build a [`PageResult`]
    ///
    /// `has_next` is `(page_number + 1) * page_size < total` and
    /// `has_previous` is `page_number > 1`.
    pub fn assemble<M>(items: Vec<M>, total: u64, page_number: u32, page_size: u32) -> PageResult<M> {
        let has_next = (u64::from(page_number) + 1).saturating_mul(u64::from(page_size)) < total;
        PageResult {
            total_count: total,
            has_next,
            has_previous: page_number > 1,
            page_number,
            page_size,
            items,
        }
    }
}
