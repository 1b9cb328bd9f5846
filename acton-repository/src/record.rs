//! Record accessors
//!
//! The query engine never touches concrete record types directly. It walks
//! them through [`Record::field`], which hands back a borrowed [`Value`] for
//! a canonical property name registered in the record's
//! [`Schema`](crate::schema::Schema).
//!
//! # Example
//!
//! ```rust
//! use acton_repository::record::{Record, Value};
//!
//! struct Tag {
//!     name: String,
//!     weight: i64,
//! }
//!
//! impl Record for Tag {
//!     fn field(&self, name: &str) -> Value<'_> {
//!         match name {
//!             "name" => Value::from(&self.name),
//!             "weight" => Value::from(self.weight),
//!             _ => Value::Null,
//!         }
//!     }
//! }
//!
//! let tag = Tag { name: "sale".into(), weight: 2 };
//! assert!(matches!(tag.field("name"), Value::Text("sale")));
//! assert!(tag.field("missing").is_null());
//! ```

use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use uuid::Uuid;

use crate::schema::Schema;

/// Borrowed view of one property value
#[derive(Clone)]
pub enum Value<'a> {
    /// Absent value, or an absent reference somewhere along the path
    Null,
    /// Text
    Text(&'a str),
    /// Integer
    Integer(i64),
    /// Float
    Float(f64),
    /// Boolean
    Boolean(bool),
    /// UUID
    Uuid(Uuid),
    /// Date and time
    DateTime(NaiveDateTime),
    /// Duration
    Duration(TimeDelta),
    /// A referenced record
    Record(&'a dyn Record),
    /// Elements of a collection property
    List(Vec<Value<'a>>),
}

impl<'a> Value<'a> {
    /// Whether this is [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Wrap a referenced record
    pub fn record<R: Record>(record: &'a R) -> Self {
        Self::Record(record as &dyn Record)
    }

    /// Wrap an optional reference; `None` becomes [`Value::Null`]
    pub fn optional_record<R: Record>(record: Option<&'a R>) -> Self {
        record.map_or(Self::Null, Self::record)
    }

    /// Wrap a collection of nested records
    pub fn records<R: Record>(records: &'a [R]) -> Self {
        Self::List(records.iter().map(Self::record).collect())
    }

    /// Wrap a collection of scalars
    pub fn list<T>(items: &'a [T]) -> Self
    where
        &'a T: Into<Value<'a>>,
    {
        Self::List(items.iter().map(Into::into).collect())
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Text(value) => write!(f, "Text({value:?})"),
            Self::Integer(value) => write!(f, "Integer({value})"),
            Self::Float(value) => write!(f, "Float({value})"),
            Self::Boolean(value) => write!(f, "Boolean({value})"),
            Self::Uuid(value) => write!(f, "Uuid({value})"),
            Self::DateTime(value) => write!(f, "DateTime({value})"),
            Self::Duration(value) => write!(f, "Duration({value})"),
            Self::Record(_) => write!(f, "Record(..)"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(value: &'a String) -> Self {
        Self::Text(value.as_str())
    }
}

impl From<i64> for Value<'_> {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&i64> for Value<'_> {
    fn from(value: &i64) -> Self {
        Self::Integer(*value)
    }
}

impl From<i32> for Value<'_> {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Value<'_> {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value<'_> {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value<'_> {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Uuid> for Value<'_> {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<&Uuid> for Value<'_> {
    fn from(value: &Uuid) -> Self {
        Self::Uuid(*value)
    }
}

impl From<NaiveDateTime> for Value<'_> {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<TimeDelta> for Value<'_> {
    fn from(value: TimeDelta) -> Self {
        Self::Duration(value)
    }
}

impl<'a, T> From<Option<T>> for Value<'a>
where
    T: Into<Value<'a>>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Named property access used by the query engine
///
/// Implementations return [`Value::Null`] for names they do not know.
pub trait Record: Send + Sync {
    /// Value of the property registered under `name`
    fn field(&self, name: &str) -> Value<'_>;
}

/// A store-managed record type with an identity
///
/// Identities are assigned by the store on insert; a new record carries `0`
/// until then.
pub trait Entity: Record + Clone + PartialEq + Send + Sync + 'static {
    /// Registered schema for this type
    fn schema() -> &'static Schema;

    /// Current identity
    fn id(&self) -> i64;

    /// Replace the identity, used by stores after insert
    fn set_id(&mut self, id: i64);
}

/// Records deleted by flag instead of removal
pub trait SoftDelete: Entity {
    /// Set the deleted flag and stamp the deletion time
    fn mark_deleted(&mut self, at: NaiveDateTime);
}
