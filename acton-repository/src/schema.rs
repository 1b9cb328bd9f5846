//! Per-type registration of queryable properties
//!
//! A [`Schema`] is the directory the query engine consults when it turns a
//! dotted property path such as `category.name` into a typed accessor chain.
//! Each record type registers its schema once, usually behind a
//! `once_cell::sync::Lazy` static, and hands it out through
//! [`Entity::schema`](crate::record::Entity::schema).
//!
//! # Example
//!
//! ```rust
//! use acton_repository::schema::{ScalarKind, Schema};
//! use once_cell::sync::Lazy;
//!
//! fn category_schema() -> &'static Schema {
//!     static SCHEMA: Lazy<Schema> = Lazy::new(|| {
//!         Schema::builder("Category", "categories").id("id").text("name").build()
//!     });
//!     &SCHEMA
//! }
//!
//! fn product_schema() -> &'static Schema {
//!     static SCHEMA: Lazy<Schema> = Lazy::new(|| {
//!         Schema::builder("Product", "products")
//!             .id("id")
//!             .text("name")
//!             .float("price")
//!             .reference("category", "category_id", category_schema)
//!             .scalar_collection("labels", "labels", ScalarKind::Text)
//!             .search_by(["name", "category.name"])
//!             .build()
//!     });
//!     &SCHEMA
//! }
//!
//! let schema = product_schema();
//! assert!(schema.field("Name").is_some());
//! assert_eq!(schema.search_by().len(), 2);
//! ```

use std::fmt;

use crate::query::SearchTarget;

/// Lazily resolved schema, so registrations can refer to each other
pub type SchemaRef = fn() -> &'static Schema;

/// Underlying type of a scalar property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// UTF-8 text, matched case-insensitively
    Text,
    /// Signed 64-bit integer
    Integer,
    /// 64-bit floating point
    Float,
    /// Boolean flag
    Boolean,
    /// UUID identifier
    Uuid,
    /// Naive date and time
    DateTime,
    /// Signed duration
    Duration,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::Uuid => write!(f, "uuid"),
            Self::DateTime => write!(f, "date_time"),
            Self::Duration => write!(f, "duration"),
        }
    }
}

/// Element type of a collection property
#[derive(Clone, Copy)]
pub enum ElementKind {
    /// Collection of scalars, e.g. `Vec<String>`
    Scalar(ScalarKind),
    /// Collection of nested records
    Record(SchemaRef),
}

impl fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "Scalar({kind})"),
            Self::Record(schema) => write!(f, "Record({})", schema().name()),
        }
    }
}

/// Shape of a registered property
#[derive(Clone, Copy)]
pub enum FieldKind {
    /// Single scalar value
    Scalar(ScalarKind),
    /// Optional reference to another record; hops through it are null-safe
    Reference(SchemaRef),
    /// Multi-valued property; predicates below it become exists-quantifiers
    Collection(ElementKind),
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "Scalar({kind})"),
            Self::Reference(schema) => write!(f, "Reference({})", schema().name()),
            Self::Collection(element) => write!(f, "Collection({element:?})"),
        }
    }
}

/// A registered property
///
/// `column` means different things per kind:
/// - scalar: the column holding the value
/// - reference: the foreign key column on this record's table
/// - record collection: the foreign key column on the element table
/// - scalar collection: the array column
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: &'static str,
    column: &'static str,
    kind: FieldKind,
}

impl FieldDef {
    /// Canonical property name, as passed to [`Record::field`](crate::record::Record::field)
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Storage column name
    pub fn column(&self) -> &'static str {
        self.column
    }

    /// Property shape
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Scalar kind, if this is a scalar property
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self.kind {
            FieldKind::Scalar(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Soft-delete bookkeeping properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftDeleteFields {
    /// Boolean property set once a record is deleted
    pub flag: &'static str,
    /// Timestamp property recording when it happened
    pub deleted_at: &'static str,
}

/// Registered description of one record type
#[derive(Debug)]
pub struct Schema {
    name: &'static str,
    table: &'static str,
    id: &'static str,
    fields: Vec<FieldDef>,
    soft_delete: Option<SoftDeleteFields>,
    search_by: Vec<SearchTarget>,
}

impl Schema {
    /// Start registering a record type stored in `table`
    pub fn builder(name: &'static str, table: &'static str) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                name,
                table,
                id: "id",
                fields: Vec::new(),
                soft_delete: None,
                search_by: Vec::new(),
            },
        }
    }

    /// Record type name used in logs and errors
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Backing table
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// All registered properties
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look a path segment up
    ///
    /// Matching ignores ASCII case and underscores, so `createdAt`,
    /// `CreatedAt` and `created_at` all find `created_at`.
    pub fn field(&self, segment: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|field| names_match(field.name, segment))
    }

    /// The identity property
    pub fn id_field(&self) -> &FieldDef {
        // build() guarantees the id field is registered
        self.field(self.id).unwrap_or(&self.fields[0])
    }

    /// Soft-delete properties, if the type supports soft deletion
    pub fn soft_delete(&self) -> Option<SoftDeleteFields> {
        self.soft_delete
    }

    /// Default free-text search targets
    pub fn search_by(&self) -> &[SearchTarget] {
        &self.search_by
    }
}

/// Builder returned by [`Schema::builder`]
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    fn push(mut self, name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        if self.schema.field(name).is_some() {
            tracing::warn!(
                schema = self.schema.name,
                field = name,
                "Duplicate field registration ignored"
            );
            return self;
        }
        self.schema.fields.push(FieldDef { name, column, kind });
        self
    }

    /// Register the integer identity property
    #[must_use]
    pub fn id(mut self, name: &'static str) -> Self {
        self.schema.id = name;
        self.push(name, name, FieldKind::Scalar(ScalarKind::Integer))
    }

    /// Register a scalar property stored in a column of the same name
    #[must_use]
    pub fn scalar(self, name: &'static str, kind: ScalarKind) -> Self {
        self.push(name, name, FieldKind::Scalar(kind))
    }

    /// Register a scalar property stored under a different column name
    #[must_use]
    pub fn column(self, name: &'static str, column: &'static str, kind: ScalarKind) -> Self {
        self.push(name, column, FieldKind::Scalar(kind))
    }

    /// Register a text property
    #[must_use]
    pub fn text(self, name: &'static str) -> Self {
        self.scalar(name, ScalarKind::Text)
    }

    /// Register an integer property
    #[must_use]
    pub fn integer(self, name: &'static str) -> Self {
        self.scalar(name, ScalarKind::Integer)
    }

    /// Register a floating point property
    #[must_use]
    pub fn float(self, name: &'static str) -> Self {
        self.scalar(name, ScalarKind::Float)
    }

    /// Register a boolean property
    #[must_use]
    pub fn boolean(self, name: &'static str) -> Self {
        self.scalar(name, ScalarKind::Boolean)
    }

    /// Register a UUID property
    #[must_use]
    pub fn uuid(self, name: &'static str) -> Self {
        self.scalar(name, ScalarKind::Uuid)
    }

    /// Register a date/time property
    #[must_use]
    pub fn date_time(self, name: &'static str) -> Self {
        self.scalar(name, ScalarKind::DateTime)
    }

    /// Register a duration property
    #[must_use]
    pub fn duration(self, name: &'static str) -> Self {
        self.scalar(name, ScalarKind::Duration)
    }

    /// Register an optional reference to another record type
    #[must_use]
    pub fn reference(
        self,
        name: &'static str,
        foreign_key: &'static str,
        schema: SchemaRef,
    ) -> Self {
        self.push(name, foreign_key, FieldKind::Reference(schema))
    }

    /// Register a collection of nested records
    ///
    /// `foreign_key` is the element table column pointing back at this record.
    #[must_use]
    pub fn collection(
        self,
        name: &'static str,
        foreign_key: &'static str,
        schema: SchemaRef,
    ) -> Self {
        self.push(
            name,
            foreign_key,
            FieldKind::Collection(ElementKind::Record(schema)),
        )
    }

    /// Register a collection of scalars stored as an array column
    #[must_use]
    pub fn scalar_collection(
        self,
        name: &'static str,
        column: &'static str,
        kind: ScalarKind,
    ) -> Self {
        self.push(name, column, FieldKind::Collection(ElementKind::Scalar(kind)))
    }

    /// Enable soft deletion through a boolean flag and a timestamp property
    ///
    /// Both properties are registered if they have not been already.
    #[must_use]
    pub fn soft_delete(self, flag: &'static str, deleted_at: &'static str) -> Self {
        let mut builder = self.boolean(flag).date_time(deleted_at);
        builder.schema.soft_delete = Some(SoftDeleteFields { flag, deleted_at });
        builder
    }

    /// Declare the default free-text search targets
    ///
    /// Each entry is a property path, or two paths joined by a comma for
    /// concatenated matching (`"first_name,last_name"`).
    #[must_use]
    pub fn search_by<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for target in targets {
            match SearchTarget::parse(target.as_ref()) {
                Some(target) => self.schema.search_by.push(target),
                None => tracing::warn!(
                    schema = self.schema.name,
                    target = target.as_ref(),
                    "Invalid default search target ignored"
                ),
            }
        }
        self
    }

    /// Finish the registration
    pub fn build(self) -> Schema {
        let id = self.schema.id;
        let builder = if self.schema.field(id).is_none() {
            self.id(id)
        } else {
            self
        };
        builder.schema
    }
}

/// Compare two property names ignoring ASCII case and underscores
pub(crate) fn names_match(left: &str, right: &str) -> bool {
    let normalize = |name: &str| {
        name.chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect::<Vec<_>>()
    };
    normalize(left) == normalize(right)
}
