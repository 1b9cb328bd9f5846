//! Predicate evaluation over borrowed record values

use std::cmp::Ordering;

use crate::query::{Operand, Predicate, Scalar, ScalarPath};
use crate::record::Value;

/// Whether `scope` satisfies `predicate`
pub(crate) fn matches(predicate: &Predicate, scope: &Value<'_>) -> bool {
    match predicate {
        Predicate::True => true,
        Predicate::IsNull(operand) => with_operand(operand, scope, |value| value.is_null()),
        Predicate::IsNotNull(operand) => with_operand(operand, scope, |value| !value.is_null()),
        Predicate::Contains(operand, needle) => with_operand(operand, scope, |value| match value {
            Value::Text(text) => text.to_lowercase().contains(needle.as_str()),
            _ => false,
        }),
        Predicate::In(operand, members) => with_operand(operand, scope, |value| {
            members.iter().any(|member| member_matches(value, member))
        }),
        Predicate::Between(operand, low, high) => with_operand(operand, scope, |value| {
            matches!(compare(value, low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare(value, high), Some(Ordering::Less | Ordering::Equal))
        }),
        Predicate::Eq(operand, expected) => with_operand(operand, scope, |value| {
            compare(value, expected) == Some(Ordering::Equal)
        }),
        Predicate::Any {
            via,
            collection,
            inner,
        } => {
            let Value::Record(owner) = walk(scope.clone(), via) else {
                return false;
            };
            match owner.field(collection.name()) {
                Value::List(items) => items.iter().any(|item| matches(inner, item)),
                _ => false,
            }
        }
        Predicate::And(predicates) => predicates.iter().all(|p| matches(p, scope)),
        Predicate::Or(predicates) => predicates.iter().any(|p| matches(p, scope)),
    }
}

/// Ascending comparison of two records on `path`; nulls sort first
pub(crate) fn order(path: &ScalarPath, left: &Value<'_>, right: &Value<'_>) -> Ordering {
    let left = path_value(path, left);
    let right = path_value(path, right);
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare_values(&left, &right).unwrap_or(Ordering::Equal),
    }
}

fn with_operand<F>(operand: &Operand, scope: &Value<'_>, test: F) -> bool
where
    F: FnOnce(&Value<'_>) -> bool,
{
    match operand {
        Operand::Path(path) => test(&path_value(path, scope)),
        Operand::Concat(first, second) => {
            let joined = format!(
                "{} {}",
                text_or_empty(&path_value(first, scope)),
                text_or_empty(&path_value(second, scope))
            );
            test(&Value::Text(&joined))
        }
    }
}

fn text_or_empty<'a>(value: &Value<'a>) -> &'a str {
    match value {
        Value::Text(text) => *text,
        _ => "",
    }
}

/// Follow reference hops; any absent hop yields `Null`
fn walk<'a>(scope: Value<'a>, via: &[crate::query::FieldRef]) -> Value<'a> {
    let mut current = scope;
    for hop in via {
        current = match current {
            Value::Record(record) => record.field(hop.name()),
            _ => return Value::Null,
        };
    }
    current
}

fn path_value<'a>(path: &ScalarPath, scope: &Value<'a>) -> Value<'a> {
    let owner = walk(scope.clone(), &path.via);
    match path.leaf {
        Some(leaf) => match owner {
            Value::Record(record) => record.field(leaf.name()),
            _ => Value::Null,
        },
        // scalar collection element
        None => owner,
    }
}

fn member_matches(value: &Value<'_>, member: &Scalar) -> bool {
    match (value, member) {
        (Value::Text(text), Scalar::Text(member)) => text.to_lowercase() == *member,
        _ => compare(value, member) == Some(Ordering::Equal),
    }
}

fn compare(value: &Value<'_>, scalar: &Scalar) -> Option<Ordering> {
    compare_values(value, &scalar_value(scalar))
}

fn scalar_value(scalar: &Scalar) -> Value<'_> {
    match scalar {
        Scalar::Text(text) => Value::Text(text),
        Scalar::Integer(value) => Value::Integer(*value),
        Scalar::Float(value) => Value::Float(*value),
        Scalar::Boolean(value) => Value::Boolean(*value),
        Scalar::Uuid(value) => Value::Uuid(*value),
        Scalar::DateTime(value) => Value::DateTime(*value),
        Scalar::Duration(value) => Value::Duration(*value),
    }
}

#[allow(clippy::cast_precision_loss)]
fn compare_values(left: &Value<'_>, right: &Value<'_>) -> Option<Ordering> {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
