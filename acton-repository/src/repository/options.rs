//! Paginated listing options
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::PaginatedOptions;
//!
//! let options = PaginatedOptions::from_query_pairs([
//!     ("category.name", "audio"),
//!     ("sortBy", "price"),
//!     ("direction", "asc"),
//!     ("pageSize", "5"),
//! ]);
//! assert_eq!(options.sort_by.as_deref(), Some("price"));
//! assert_eq!(options.page_size, 5);
//! assert_eq!(options.page_number, 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::query::{FilterSet, SearchOptions};
use crate::schema::names_match;

/// Page number used when the request has none
pub const DEFAULT_PAGE_NUMBER: u32 = 1;

/// Page size used when the request has none
pub const DEFAULT_PAGE_SIZE: u32 = 10;

fn default_page_number() -> u32 {
    DEFAULT_PAGE_NUMBER
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Filters, search, sort and page for one listing call
///
/// Wire shape (camelCase):
/// `{ filters: {string: string|null}, search: {value, properties?}, sortBy?, direction?, pageNumber, pageSize }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedOptions {
    /// Property path to raw value
    #[serde(default)]
    pub filters: FilterSet,
    /// Free-text search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchOptions>,
    /// Sort path; blank sorts by identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    /// `asc` or `desc`; anything else sorts descending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// 1-based page number
    #[serde(default = "default_page_number")]
    pub page_number: u32,
    /// Records per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for PaginatedOptions {
    fn default() -> Self {
        Self {
            filters: FilterSet::new(),
            search: None,
            sort_by: None,
            direction: None,
            page_number: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaginatedOptions {
    /// Build options from raw query-string pairs
    ///
    /// Every pair lands in `filters` (pagination keys are ignored there at
    /// compile time). Repeated keys join their values with `,`, which makes
    /// them a membership filter. Pagination keys also fill their typed
    /// fields; page numbers and sizes that do not parse keep their defaults.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());

            match options.filters.get_mut(key) {
                Some(Some(existing)) => {
                    existing.push(',');
                    existing.push_str(value);
                }
                _ => {
                    options
                        .filters
                        .insert(key.to_string(), Some(value.to_string()));
                }
            }

            if names_match(key, "sortBy") {
                options.sort_by = Some(value.to_string());
            } else if names_match(key, "direction") {
                options.direction = Some(value.to_string());
            } else if names_match(key, "pageNumber") {
                if let Ok(page_number) = value.trim().parse() {
                    options.page_number = page_number;
                }
            } else if names_match(key, "pageSize") {
                if let Ok(page_size) = value.trim().parse() {
                    options.page_size = page_size;
                }
            } else if names_match(key, "search") || names_match(key, "search.value") {
                options.search_mut().value = value.to_string();
            } else if names_match(key, "search.properties") {
                options
                    .search_mut()
                    .properties
                    .get_or_insert_with(Vec::new)
                    .push(value.to_string());
            }
        }
        options
    }

    fn search_mut(&mut self) -> &mut SearchOptions {
        self.search.get_or_insert_with(SearchOptions::default)
    }

    /// Add a filter
    #[must_use]
    pub fn with_filter(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(path.into(), Some(value.into()));
        self
    }

    /// Add a filter matching records where the property is null
    #[must_use]
    pub fn with_null_filter(mut self, path: impl Into<String>) -> Self {
        self.filters.insert(path.into(), None);
        self
    }

    /// Set the free-text search
    #[must_use]
    pub fn with_search(mut self, search: SearchOptions) -> Self {
        self.search = Some(search);
        self
    }

    /// Set the ordering
    #[must_use]
    pub fn with_sort(mut self, path: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort_by = Some(path.into());
        self.direction = Some(direction.into());
        self
    }

    /// Set the page
    #[must_use]
    pub fn with_page(mut self, page_number: u32, page_size: u32) -> Self {
        self.page_number = page_number;
        self.page_size = page_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PaginatedOptions::default();
        assert_eq!(options.page_number, 1);
        assert_eq!(options.page_size, 10);
        assert!(options.filters.is_empty());
        assert!(options.search.is_none());
    }

    #[test]
    fn test_deserialize_defaults() {
        let options: PaginatedOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, PaginatedOptions::default());
    }

    #[test]
    fn test_deserialize_wire_shape() {
        let options: PaginatedOptions = serde_json::from_str(
            r#"{
                "filters": {"name": "mouse", "description": null},
                "search": {"value": "usb", "properties": ["labels"]},
                "sortBy": "price",
                "direction": "ASC",
                "pageNumber": 2,
                "pageSize": 25
            }"#,
        )
        .unwrap();

        assert_eq!(options.filters.get("name"), Some(&Some("mouse".to_string())));
        assert_eq!(options.filters.get("description"), Some(&None));
        assert_eq!(
            options.search,
            Some(SearchOptions::new("usb").with_properties(["labels"]))
        );
        assert_eq!(options.sort_by.as_deref(), Some("price"));
        assert_eq!(options.direction.as_deref(), Some("ASC"));
        assert_eq!(options.page_number, 2);
        assert_eq!(options.page_size, 25);
    }

    #[test]
    fn test_serialize_skips_unset() {
        let json = serde_json::to_value(PaginatedOptions::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "filters": {}, "pageNumber": 1, "pageSize": 10 })
        );
    }

    #[test]
    fn test_from_query_pairs_copies_everything_into_filters() {
        let options = PaginatedOptions::from_query_pairs([
            ("name", "mouse"),
            ("PageNumber", "3"),
            ("page_size", "50"),
            ("Direction", "asc"),
        ]);
        assert_eq!(options.filters.len(), 4);
        assert_eq!(options.page_number, 3);
        assert_eq!(options.page_size, 50);
        assert_eq!(options.direction.as_deref(), Some("asc"));
    }

    #[test]
    fn test_from_query_pairs_joins_repeated_keys() {
        let options = PaginatedOptions::from_query_pairs([("stock", "1"), ("stock", "2")]);
        assert_eq!(options.filters.get("stock"), Some(&Some("1,2".to_string())));
    }

    #[test]
    fn test_from_query_pairs_search() {
        let options = PaginatedOptions::from_query_pairs([
            ("search.value", "usb"),
            ("search.properties", "labels"),
            ("search.properties", "name,description"),
        ]);
        assert_eq!(
            options.search,
            Some(SearchOptions::new("usb").with_properties(["labels", "name,description"]))
        );
    }

    #[test]
    fn test_from_query_pairs_bad_page_keeps_default() {
        let options = PaginatedOptions::from_query_pairs([("pageNumber", "two")]);
        assert_eq!(options.page_number, DEFAULT_PAGE_NUMBER);
    }

    #[test]
    fn test_builders() {
        let options = PaginatedOptions::default()
            .with_filter("name", "mouse")
            .with_null_filter("description")
            .with_sort("price", "asc")
            .with_page(2, 5);
        assert_eq!(options.filters.len(), 2);
        assert_eq!(options.sort_by.as_deref(), Some("price"));
        assert_eq!(options.page_number, 2);
        assert_eq!(options.page_size, 5);
    }
}
