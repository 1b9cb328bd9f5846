//! # acton-repository
//!
//! Generic data access over registered record types: untyped filter maps,
//! free-text search, sorting and pagination compile into typed predicates that
//! run against an in-memory store or PostgreSQL.
//!
//! ## Features
//!
//! - **Schemas**: register properties, references, collections and soft-delete
//!   fields once per record type
//! - **Filters**: `property.path -> raw value` pairs with an inline mini-language
//!   (`!`, `a,b`, `from;to`, partial dates)
//! - **Search**: one term across default or requested targets, including
//!   concatenated pairs such as `first_name,last_name`
//! - **Paging**: 1-based page windows with total counts
//! - **Repository**: get, list, create, update (tracked or untracked) and soft delete
//! - **Backends**: in-memory tables and PostgreSQL via `sqlx`
//!
//! ## Example
//!
//! ```rust,ignore
//! use acton_repository::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let store = MemoryStore::new();
//!     let mut repo = GenericRepository::open(&store).with_pagination(config.pagination);
//!     let cancel = CancellationToken::new();
//!
//!     let options = PaginatedOptions::from_query_pairs([("name", "keyboard"), ("pageSize", "5")]);
//!     let page = repo.get_paginated::<Product, ProductSummary>(&options, &cancel).await?;
//!     println!("{} of {}", page.items().len(), page.total_count());
//!     Ok(())
//! }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod observability;
pub mod query;
pub mod record;
pub mod repository;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

/// Commonly used types
pub mod prelude {
    pub use crate::backends::memory::{MemorySession, MemoryStore};
    pub use crate::config::{Config, DatabaseConfig, PaginationConfig};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;
    pub use crate::query::{
        FilterCompiler, FilterSet, PageResult, Paginator, Predicate, PredicateBuilder,
        SearchCompiler, SearchOptions, SortDirection, Sorter, StoreQuery,
    };
    pub use crate::record::{Entity, Record, SoftDelete, Value};
    pub use crate::repository::{
        GenericRepository, PaginatedOptions, RecordStore, RepositoryError, RepositoryErrorKind,
        RepositoryOperation, RepositoryResult, StoreSession,
    };
    pub use crate::schema::{ScalarKind, Schema};

    #[cfg(feature = "database")]
    pub use crate::backends::postgres::{PgEntity, PgSession, PgStore};

    pub use tokio_util::sync::CancellationToken;
}
