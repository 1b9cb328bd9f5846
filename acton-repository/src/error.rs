//! Crate-level error types

use thiserror::Error;

use crate::repository::RepositoryError;

/// Errors raised outside a single repository call: configuration,
/// tracing setup, store construction
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Repository or store error
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

/// Result type alias using the crate error type
pub type Result<T> = std::result::Result<T, Error>;
