//! Ordering by property path

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::path::resolve_scalar;
use crate::query::predicate::ScalarPath;
use crate::query::StoreQuery;
use crate::schema::Schema;

/// Direction for ordering results
///
/// # Example
///
/// ```rust
/// use acton_repository::query::SortDirection;
///
/// assert_eq!(SortDirection::parse(Some(" ASC ")), SortDirection::Asc);
/// assert_eq!(SortDirection::parse(Some("up")), SortDirection::Desc);
/// assert_eq!(SortDirection::parse(None), SortDirection::Desc);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first; nulls first
    Asc,
    /// Largest first; nulls last
    #[default]
    Desc,
}

impl SortDirection {
    /// `asc` in any case is ascending, everything else descending
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(direction) if direction.eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    /// Apply this direction to an ascending comparison
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// A resolved ordering
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Property sorted on
    pub path: ScalarPath,
    /// Sort direction
    pub direction: SortDirection,
}

/// Turns a sort path and direction into an [`OrderBy`]
pub struct Sorter;

impl Sorter {
    /// Resolve the ordering; a blank path sorts by identity
    ///
    /// Returns `None` when the path does not resolve to a scalar, leaving the
    /// store's natural order in place.
    pub fn order_by(
        schema: &'static Schema,
        path: Option<&str>,
        direction: Option<&str>,
    ) -> Option<OrderBy> {
        let direction = SortDirection::parse(direction);
        let path = match path.map(str::trim) {
            Some(path) if !path.is_empty() => path,
            _ => schema.id_field().name(),
        };

        match resolve_scalar(schema, path) {
            Some(path) => Some(OrderBy { path, direction }),
            None => {
                tracing::debug!(schema = schema.name(), path, "Unknown sort path; order unchanged");
                None
            }
        }
    }

    /// Order `query`; an unresolvable path leaves it as it was
    pub fn sort(
        query: StoreQuery,
        schema: &'static Schema,
        path: Option<&str>,
        direction: Option<&str>,
    ) -> StoreQuery {
        match Self::order_by(schema, path, direction) {
            Some(order) => query.ordered_by(order),
            None => query,
        }
    }
}
