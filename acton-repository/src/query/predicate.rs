//! First-class predicate values
//!
//! Compilers produce [`Predicate`] trees; each backend interprets them
//! natively (the memory store evaluates them, the Postgres store renders
//! them to parameterised SQL).

use std::fmt;
use std::ops::Deref;

use chrono::{NaiveDateTime, TimeDelta};
use uuid::Uuid;

use crate::schema::{FieldDef, ScalarKind};

/// Owned scalar constant inside a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Text
    Text(String),
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
}

impl Scalar {
    /// Kind of this constant
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Text(_) => ScalarKind::Text,
            Self::Integer(_) => ScalarKind::Integer,
            Self::Float(_) => ScalarKind::Float,
            Self::Boolean(_) => ScalarKind::Boolean,
            Self::Uuid(_) => ScalarKind::Uuid,
            Self::DateTime(_) => ScalarKind::DateTime,
            Self::Duration(_) => ScalarKind::Duration,
        }
    }
}

/// Handle on a registered property
///
/// Compared by name and column so predicates can be asserted on in tests.
#[derive(Clone, Copy)]
pub struct FieldRef(&'static FieldDef);

impl FieldRef {
    /// Wrap a registered property
    pub fn new(field: &'static FieldDef) -> Self {
        Self(field)
    }
}

impl Deref for FieldRef {
    type Target = FieldDef;

    fn deref(&self) -> &FieldDef {
        self.0
    }
}

impl PartialEq for FieldRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.name() == other.0.name() && self.0.column() == other.0.column()
    }
}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name())
    }
}

/// Typed accessor chain ending on a scalar
///
/// `via` are reference hops walked null-safely. A `leaf` of `None` denotes
/// the element itself, for scalar collections.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarPath {
    /// Reference hops from the scope record
    pub via: Vec<FieldRef>,
    /// Scalar property read at the end of the hops
    pub leaf: Option<FieldRef>,
    /// Scalar kind of the leaf
    pub kind: ScalarKind,
}

impl ScalarPath {
    /// Path to a scalar property on the scope record itself
    pub fn field(field: &'static FieldDef, kind: ScalarKind) -> Self {
        Self {
            via: Vec::new(),
            leaf: Some(FieldRef::new(field)),
            kind,
        }
    }

    /// Path denoting a scalar collection element
    pub fn element(kind: ScalarKind) -> Self {
        Self {
            via: Vec::new(),
            leaf: None,
            kind,
        }
    }
}

impl fmt::Display for ScalarPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.via.iter().map(|hop| hop.name()).collect();
        names.push(self.leaf.map_or("<element>", |leaf| leaf.name()));
        write!(f, "{}", names.join("."))
    }
}

/// Left-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A single scalar path
    Path(ScalarPath),
    /// Two text paths joined by a single space; nulls count as empty
    Concat(ScalarPath, ScalarPath),
}

impl Operand {
    /// Scalar kind the operand evaluates to
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Path(path) => path.kind,
            Self::Concat(..) => ScalarKind::Text,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path}"),
            Self::Concat(first, second) => write!(f, "{first},{second}"),
        }
    }
}

impl From<ScalarPath> for Operand {
    fn from(path: ScalarPath) -> Self {
        Self::Path(path)
    }
}

/// Boolean condition over a record
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record
    True,
    /// Operand is null, or an absent reference along its hops
    IsNull(Operand),
    /// Operand is present
    IsNotNull(Operand),
    /// Lower-cased operand contains the needle, which is already lower-cased
    Contains(Operand, String),
    /// Operand equals one of the constants; text operands compare lower-cased
    In(Operand, Vec<Scalar>),
    /// `low <= operand <= high`
    Between(Operand, Scalar, Scalar),
    /// Operand equals the constant; a constant of a different kind never matches
    Eq(Operand, Scalar),
    /// Some element of the collection reached through `via` matches `inner`
    Any {
        /// Reference hops to the record owning the collection
        via: Vec<FieldRef>,
        /// Collection property
        collection: FieldRef,
        /// Condition evaluated with each element as scope
        inner: Box<Predicate>,
    },
    /// All must hold; empty is true
    And(Vec<Predicate>),
    /// At least one must hold; empty is false
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Whether this is [`Predicate::True`]
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Conjunction, flattening nested `And`s and dropping `True`
    #[must_use]
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Self::True, other) => other,
            (this, Self::True) => this,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (this, Self::And(mut right)) => {
                right.insert(0, this);
                Self::And(right)
            }
            (this, other) => Self::And(vec![this, other]),
        }
    }

    /// Conjunction of all predicates; `True` when there are none
    pub fn all<I>(predicates: I) -> Predicate
    where
        I: IntoIterator<Item = Predicate>,
    {
        predicates.into_iter().fold(Self::True, Self::and)
    }

    /// Disjunction of all predicates; `None` when there are none
    pub fn any_of<I>(predicates: I) -> Option<Predicate>
    where
        I: IntoIterator<Item = Predicate>,
    {
        let mut predicates: Vec<Predicate> = predicates.into_iter().collect();
        match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(Self::Or(predicates)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::product_schema;

    fn name_path() -> ScalarPath {
        let field = product_schema().field("name").unwrap();
        ScalarPath::field(field, ScalarKind::Text)
    }

    #[test]
    fn test_and_drops_true() {
        let contains = Predicate::Contains(name_path().into(), "key".to_string());
        assert_eq!(Predicate::True.and(contains.clone()), contains);
        assert_eq!(contains.clone().and(Predicate::True), contains);
        assert!(Predicate::True.and(Predicate::True).is_true());
    }

    #[test]
    fn test_and_flattens() {
        let a = Predicate::IsNull(name_path().into());
        let b = Predicate::IsNotNull(name_path().into());
        let c = Predicate::Contains(name_path().into(), "x".to_string());

        let combined = a.clone().and(b.clone()).and(c.clone());
        assert_eq!(combined, Predicate::And(vec![a, b, c]));
    }

    #[test]
    fn test_all_and_any_of() {
        assert!(Predicate::all(Vec::new()).is_true());
        assert!(Predicate::any_of(Vec::new()).is_none());

        let single = Predicate::IsNull(name_path().into());
        assert_eq!(Predicate::any_of(vec![single.clone()]), Some(single.clone()));
        assert_eq!(
            Predicate::any_of(vec![single.clone(), single.clone()]),
            Some(Predicate::Or(vec![single.clone(), single]))
        );
    }

    #[test]
    fn test_display_paths() {
        let schema = product_schema();
        let category = FieldRef::new(schema.field("category").unwrap());
        let path = ScalarPath {
            via: vec![category],
            leaf: Some(FieldRef::new(crate::testing::category_schema().field("name").unwrap())),
            kind: ScalarKind::Text,
        };
        assert_eq!(path.to_string(), "category.name");
        assert_eq!(ScalarPath::element(ScalarKind::Text).to_string(), "<element>");
        assert_eq!(
            Operand::Concat(name_path(), name_path()).to_string(),
            "name,name"
        );
    }

    #[test]
    fn test_scalar_kind() {
        assert_eq!(Scalar::Text("a".into()).kind(), ScalarKind::Text);
        assert_eq!(Scalar::Duration(TimeDelta::zero()).kind(), ScalarKind::Duration);
    }
}
