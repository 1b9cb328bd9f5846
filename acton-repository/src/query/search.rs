//! Disjunctive free-text search compilation

use serde::{Deserialize, Serialize};

use crate::query::builder::{text_predicate, PredicateBuilder};
use crate::query::path::{resolve, resolve_scalar};
use crate::query::predicate::{Operand, Predicate};
use crate::schema::{ScalarKind, Schema};

/// One place a search term is looked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTarget {
    /// A single property path
    Path(String),
    /// Two text paths matched as `"{first} {second}"`
    Concat(String, String),
}

impl SearchTarget {
    /// Parse `"path"` or `"first,second"`; more than two parts is invalid
    pub fn parse(target: &str) -> Option<Self> {
        if !target.contains(',') {
            return Some(Self::Path(target.trim().to_string()));
        }
        match target.split(',').map(str::trim).collect::<Vec<_>>().as_slice() {
            [first, second] => Some(Self::Concat(first.to_string(), second.to_string())),
            _ => None,
        }
    }
}

/// A search term and the properties to look in
///
/// With `properties` unset the schema's default targets apply; an empty
/// list searches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// The term, trimmed before use
    #[serde(default)]
    pub value: String,
    /// Explicit targets overriding the schema defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
}

impl SearchOptions {
    /// Search the schema's default targets
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            properties: None,
        }
    }

    /// Search only the given targets
    #[must_use]
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = Some(properties.into_iter().map(Into::into).collect());
        self
    }
}

/// Compiles [`SearchOptions`] into an OR over targets
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchCompiler {
    builder: PredicateBuilder,
}

impl SearchCompiler {
    /// Compiler using the given predicate builder
    pub fn new(builder: PredicateBuilder) -> Self {
        Self { builder }
    }

    /// `None` when the term is blank or no target contributes
    pub fn compile(&self, schema: &'static Schema, search: &SearchOptions) -> Option<Predicate> {
        let term = search.value.trim();
        if term.is_empty() {
            return None;
        }

        let targets: Vec<SearchTarget> = match &search.properties {
            Some(properties) => properties
                .iter()
                .filter_map(|property| {
                    let target = SearchTarget::parse(property);
                    if target.is_none() {
                        tracing::debug!(
                            schema = schema.name(),
                            target = property.as_str(),
                            "Invalid search target skipped"
                        );
                    }
                    target
                })
                .collect(),
            None => schema.search_by().to_vec(),
        };

        let predicate = Predicate::any_of(
            targets
                .iter()
                .filter_map(|target| self.compile_target(schema, target, term)),
        );
        if predicate.is_none() {
            tracing::debug!(schema = schema.name(), term, "No search target contributed");
        }
        predicate
    }

    fn compile_target(
        &self,
        schema: &'static Schema,
        target: &SearchTarget,
        term: &str,
    ) -> Option<Predicate> {
        match target {
            SearchTarget::Path(path) => {
                let resolved = resolve(schema, path)?;
                self.builder.build_path(&resolved, Some(term))
            }
            SearchTarget::Concat(first, second) => {
                let text = |path: &str| {
                    resolve_scalar(schema, path).filter(|path| path.kind == ScalarKind::Text)
                };
                let operand = Operand::Concat(text(first.as_str())?, text(second.as_str())?);
                Some(text_predicate(&operand, term))
            }
        }
    }
}
