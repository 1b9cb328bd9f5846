//! Record store backends
//!
//! - [`memory`]: in-process tables, evaluating predicates directly
//! - [`postgres`]: PostgreSQL through `sqlx` (requires the `database` feature)

pub mod memory;

#[cfg(feature = "database")]
pub mod postgres;
