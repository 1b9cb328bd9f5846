//! Raw value to predicate dispatch
//!
//! [`PredicateBuilder::build`] turns one operand and one untyped value into
//! a predicate. Rules apply in priority order:
//!
//! | value                       | operand   | predicate                               |
//! |-----------------------------|-----------|-----------------------------------------|
//! | `""`                        | any       | none                                    |
//! | absent                      | any       | `IsNull`                                |
//! | contains `,`                | text      | `In` over lower-cased trimmed tokens    |
//! | anything else               | text      | case-insensitive substring              |
//! | `!`                         | non-text  | `IsNotNull`                             |
//! | contains `,`                | non-text  | `In` over parsed tokens                 |
//! | contains `;`                | date/time | inclusive explicit range                |
//! | anything else               | date/time | the whole day of the parsed date        |
//! | anything else               | other     | `Eq` with the parsed value              |
//!
//! Values that fail to parse degrade to an equality against the raw text,
//! which never matches.

use chrono::{Local, NaiveDate};

use crate::query::convert::{adjust_range_end, end_of_day, parse_date_time, parse_scalar};
use crate::query::path::ResolvedPath;
use crate::query::predicate::{Operand, Predicate, Scalar};
use crate::schema::ScalarKind;

/// Turns untyped values into typed predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredicateBuilder {
    today: NaiveDate,
}

impl Default for PredicateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PredicateBuilder {
    /// Builder whose partial dates resolve against the local current date
    pub fn new() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }

    /// Builder with a pinned current date
    pub fn with_reference_date(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Date used to complete `dd/MM` and `dd` values
    pub fn reference_date(&self) -> NaiveDate {
        self.today
    }

    /// Build a predicate for `operand` from the raw `value`
    ///
    /// `None` means the value was absent. Returns `None` when the value
    /// contributes nothing.
    pub fn build(&self, operand: &Operand, value: Option<&str>) -> Option<Predicate> {
        let Some(value) = value else {
            return Some(Predicate::IsNull(operand.clone()));
        };
        if value.is_empty() {
            return None;
        }

        let kind = operand.kind();
        if kind == ScalarKind::Text {
            return Some(text_predicate(operand, value));
        }
        if value == "!" {
            return Some(Predicate::IsNotNull(operand.clone()));
        }
        if value.contains(',') {
            return self.membership(operand, value);
        }
        if value.contains(';') && kind == ScalarKind::DateTime {
            return self.explicit_range(operand, value);
        }
        self.typed(operand, value)
    }

    /// Build the predicate for a resolved path, wrapping collection hops
    pub fn build_path(&self, path: &ResolvedPath, value: Option<&str>) -> Option<Predicate> {
        match path {
            ResolvedPath::Scalar(scalar) => self.build(&Operand::Path(scalar.clone()), value),
            ResolvedPath::Collection {
                via,
                collection,
                element,
            } => {
                let inner = self.build_path(element, value)?;
                Some(Predicate::Any {
                    via: via.clone(),
                    collection: *collection,
                    inner: Box::new(inner),
                })
            }
        }
    }

    fn membership(&self, operand: &Operand, value: &str) -> Option<Predicate> {
        let kind = operand.kind();
        let tokens = value
            .split(',')
            .map(|token| parse_scalar(kind, token.trim(), self.today))
            .collect::<Option<Vec<_>>>();

        match tokens {
            Some(tokens) => Some(Predicate::In(operand.clone(), tokens)),
            None => {
                tracing::debug!(
                    operand = %operand,
                    value,
                    %kind,
                    "Membership value has an unparsable token; no predicate"
                );
                None
            }
        }
    }

    fn explicit_range(&self, operand: &Operand, value: &str) -> Option<Predicate> {
        let mut ends = value
            .split(';')
            .map(str::trim)
            .filter(|end| !end.is_empty())
            .filter_map(|end| parse_date_time(end, self.today));

        let range = match (ends.next(), ends.next()) {
            (Some(start), Some(end)) => adjust_range_end(end).map(|end| (start, end)),
            (Some(only), None) => adjust_range_end(only).map(|end| (only, end)),
            _ => None,
        };

        match range {
            Some((start, end)) => Some(Predicate::Between(
                operand.clone(),
                Scalar::DateTime(start),
                Scalar::DateTime(end),
            )),
            None => {
                tracing::debug!(operand = %operand, value, "Date range has no usable end; no predicate");
                None
            }
        }
    }

    fn typed(&self, operand: &Operand, value: &str) -> Option<Predicate> {
        let kind = operand.kind();
        let predicate = match parse_scalar(kind, value, self.today) {
            Some(Scalar::DateTime(start)) => {
                let end = end_of_day(start)?;
                Predicate::Between(operand.clone(), Scalar::DateTime(start), Scalar::DateTime(end))
            }
            Some(parsed) => Predicate::Eq(operand.clone(), parsed),
            None => {
                tracing::debug!(
                    operand = %operand,
                    value,
                    %kind,
                    "Value does not parse; comparing as text"
                );
                Predicate::Eq(operand.clone(), Scalar::Text(value.to_string()))
            }
        };
        Some(predicate)
    }
}

/// Text rule shared by filters and concatenated search
pub(crate) fn text_predicate(operand: &Operand, value: &str) -> Predicate {
    if value.contains(',') {
        let tokens = value
            .split(',')
            .map(|token| Scalar::Text(token.trim().to_lowercase()))
            .collect();
        Predicate::In(operand.clone(), tokens)
    } else {
        Predicate::Contains(operand.clone(), value.to_lowercase())
    }
}
