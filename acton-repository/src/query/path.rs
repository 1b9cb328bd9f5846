//! Dotted property path resolution

use crate::query::predicate::{FieldRef, ScalarPath};
use crate::schema::{ElementKind, FieldKind, Schema};

/// A property path resolved against a schema
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPath {
    /// Scalar leaf reached through zero or more reference hops
    Scalar(ScalarPath),
    /// A collection hop; `element` resolves against the element type
    Collection {
        /// Reference hops before the collection
        via: Vec<FieldRef>,
        /// The collection property
        collection: FieldRef,
        /// Remainder of the path, relative to one element
        element: Box<ResolvedPath>,
    },
}

/// Resolve `path` (e.g. `tags.name`, `category.name`) against `schema`
///
/// Returns `None` for an unknown segment, for segments left over after a
/// scalar, or for a path that stops on a reference or a record collection.
pub fn resolve(schema: &'static Schema, path: &str) -> Option<ResolvedPath> {
    let segments = split(path)?;
    walk(schema, &segments, true)
}

/// Like [`resolve`], but a collection hop anywhere fails the resolution
pub fn resolve_scalar(schema: &'static Schema, path: &str) -> Option<ScalarPath> {
    let segments = split(path)?;
    match walk(schema, &segments, false)? {
        ResolvedPath::Scalar(path) => Some(path),
        ResolvedPath::Collection { .. } => None,
    }
}

fn split(path: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return None;
    }
    Some(segments)
}

fn walk(
    schema: &'static Schema,
    segments: &[&str],
    allow_collections: bool,
) -> Option<ResolvedPath> {
    let mut via = Vec::new();
    let mut current = schema;

    for (index, segment) in segments.iter().enumerate() {
        let field = current.field(segment)?;
        let rest = &segments[index + 1..];

        match field.kind() {
            FieldKind::Scalar(kind) => {
                if !rest.is_empty() {
                    return None;
                }
                return Some(ResolvedPath::Scalar(ScalarPath {
                    via,
                    leaf: Some(FieldRef::new(field)),
                    kind,
                }));
            }
            FieldKind::Reference(target) => {
                via.push(FieldRef::new(field));
                current = target();
            }
            FieldKind::Collection(element) => {
                if !allow_collections {
                    return None;
                }
                let element = match element {
                    ElementKind::Scalar(kind) if rest.is_empty() => {
                        ResolvedPath::Scalar(ScalarPath::element(kind))
                    }
                    ElementKind::Scalar(_) => return None,
                    ElementKind::Record(_) if rest.is_empty() => return None,
                    ElementKind::Record(target) => walk(target(), rest, true)?,
                };
                return Some(ResolvedPath::Collection {
                    via,
                    collection: FieldRef::new(field),
                    element: Box::new(element),
                });
            }
        }
    }

    // ended on a reference
    None
}
