//! Conjunctive filter compilation

use std::collections::BTreeMap;

use crate::query::builder::PredicateBuilder;
use crate::query::path::resolve;
use crate::query::predicate::Predicate;
use crate::schema::{names_match, Schema};

/// Property path to raw value; `None` asks for records where the property is null
pub type FilterSet = BTreeMap<String, Option<String>>;

/// Pagination option names that never act as filters
pub const RESERVED_KEYS: [&str; 6] = [
    "filters",
    "search",
    "sortBy",
    "direction",
    "pageNumber",
    "pageSize",
];

/// Whether `key` names a pagination option (`PageSize`, `page_size`, ...)
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.iter().any(|reserved| names_match(reserved, key))
}

/// Compiles a [`FilterSet`] into an AND of per-key predicates
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterCompiler {
    builder: PredicateBuilder,
}

impl FilterCompiler {
    /// Compiler using the given predicate builder
    pub fn new(builder: PredicateBuilder) -> Self {
        Self { builder }
    }

    /// Compile every usable key; `Predicate::True` when none contribute
    ///
    /// Reserved keys, unknown paths and unusable values are skipped.
    pub fn compile(&self, schema: &'static Schema, filters: &FilterSet) -> Predicate {
        Predicate::all(
            filters
                .iter()
                .filter_map(|(key, value)| self.compile_key(schema, key, value.as_deref())),
        )
    }

    fn compile_key(
        &self,
        schema: &'static Schema,
        key: &str,
        value: Option<&str>,
    ) -> Option<Predicate> {
        if is_reserved(key) {
            return None;
        }
        let Some(path) = resolve(schema, key) else {
            tracing::debug!(schema = schema.name(), key, "Unknown filter path skipped");
            return None;
        };
        let predicate = self.builder.build_path(&path, value);
        if predicate.is_none() {
            tracing::debug!(schema = schema.name(), key, "Filter value contributed no predicate");
        }
        predicate
    }
}
