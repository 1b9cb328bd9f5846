//! Generic repository and its store collaborators
//!
//! # Features
//!
//! - **Generic repository**: [`GenericRepository`] lists, looks up, creates,
//!   updates and soft deletes any registered [`Entity`](crate::record::Entity)
//! - **Listing options**: [`PaginatedOptions`] carries filters, search, sort and page
//! - **Store seam**: [`RecordStore`] and [`StoreSession`] are implemented by
//!   each backend in [`backends`](crate::backends)
//! - **Errors**: [`RepositoryError`] with operation and record context
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_repository::repository::{GenericRepository, PaginatedOptions};
//! use acton_repository::query::SearchOptions;
//!
//! let mut repo = GenericRepository::open(&store);
//! let options = PaginatedOptions::default()
//!     .with_filter("category.name", "audio")
//!     .with_search(SearchOptions::new("wireless"))
//!     .with_sort("price", "asc")
//!     .with_page(1, 20);
//! let page = repo.get_paginated::<Product, ProductSummary>(&options, &cancel).await?;
//! ```

mod error;
mod generic;
mod options;
mod store;

pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use generic::GenericRepository;
pub use options::{PaginatedOptions, DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE};
pub use store::{RecordStore, SaveSummary, StoreSession};

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;
