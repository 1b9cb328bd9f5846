//! Predicate compilation for filters, search, sorting and pagination
//!
//! This module turns untyped request criteria into [`Predicate`] values
//! against a registered [`Schema`](crate::schema::Schema):
//!
//! - [`FilterCompiler`]: property path → raw value pairs, AND-ed
//! - [`SearchCompiler`]: one term across configured targets, OR-ed
//! - [`Sorter`]: sort path and direction
//! - [`Paginator`]: page windows and [`PageResult`] assembly
//!
//! Resolution is permissive. A key that names no property, or a value that
//! cannot be used, is logged at `debug` and skipped; compilation never fails.
//!
//! # Example
//!
//! ```rust,ignore
//! let filters: FilterSet = [("category.name".to_string(), Some("audio".to_string()))].into();
//! let filter = FilterCompiler::default().compile(Product::schema(), &filters);
//! let query = Sorter::sort(StoreQuery::new(filter), Product::schema(), Some("price"), Some("asc"));
//! let query = Paginator::window(query, 1, 20);
//! ```

pub mod builder;
pub mod convert;
pub mod filter;
pub mod page;
pub mod path;
pub mod predicate;
pub mod search;
pub mod sort;

pub use builder::PredicateBuilder;
pub use filter::{is_reserved, FilterCompiler, FilterSet, RESERVED_KEYS};
pub use page::{PageResult, Paginator, Window};
pub use path::{resolve, resolve_scalar, ResolvedPath};
pub use predicate::{FieldRef, Operand, Predicate, Scalar, ScalarPath};
pub use search::{SearchCompiler, SearchOptions, SearchTarget};
pub use sort::{OrderBy, SortDirection, Sorter};

/// A compiled query handed to a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    /// Records to include
    pub filter: Predicate,
    /// Ordering; `None` keeps the store's natural order
    pub order: Option<OrderBy>,
    /// Page window; `None` returns every match
    pub window: Option<Window>,
}

impl StoreQuery {
    /// Unordered, unwindowed query over `filter`
    pub fn new(filter: Predicate) -> Self {
        Self {
            filter,
            order: None,
            window: None,
        }
    }

    /// Replace the ordering
    #[must_use]
    pub fn ordered_by(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    /// Replace the window
    #[must_use]
    pub fn windowed(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }
}
