//! Predicate rendering to parameterised PostgreSQL
//!
//! Every constant is bound through [`QueryBuilder::push_bind`]; only
//! quoted identifiers from registered schemas are spliced into the text.
//! The scope row is always aliased `t0`; reference hops become correlated
//! subselects and collection quantifiers become `EXISTS` subqueries.

use chrono::NaiveDateTime;
use sqlx::{Postgres, QueryBuilder};

use crate::query::{FieldRef, Operand, OrderBy, Predicate, Scalar, ScalarPath, SortDirection, Window};
use crate::record::{Record, Value};
use crate::schema::{ElementKind, FieldKind, ScalarKind, Schema, SoftDeleteFields};

/// A column value to write
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// SQL NULL typed as the column's kind
    Null(ScalarKind),
    /// A single value
    Scalar(Scalar),
    /// An array column
    Array(ScalarKind, Vec<Scalar>),
}

/// Writable columns of `record`, derived from its schema
///
/// Scalars map to their columns, references to their foreign key (the
/// referenced record's identity) and scalar collections to array columns.
/// The identity and record collections are not written.
pub fn entity_columns(
    schema: &'static Schema,
    record: &dyn Record,
) -> Vec<(&'static str, ColumnValue)> {
    let id = schema.id_field().name();
    schema
        .fields()
        .iter()
        .filter(|field| field.name() != id)
        .filter_map(|field| {
            let value = match field.kind() {
                FieldKind::Scalar(kind) => column_value(kind, &record.field(field.name())),
                FieldKind::Reference(target) => {
                    let target = target();
                    let id = target.id_field();
                    let kind = id.scalar_kind().unwrap_or(ScalarKind::Integer);
                    match record.field(field.name()) {
                        Value::Record(referenced) => {
                            column_value(kind, &referenced.field(id.name()))
                        }
                        _ => ColumnValue::Null(kind),
                    }
                }
                FieldKind::Collection(ElementKind::Scalar(kind)) => {
                    let items = match record.field(field.name()) {
                        Value::List(items) => items
                            .iter()
                            .filter_map(|item| scalar_of(kind, item))
                            .collect(),
                        _ => Vec::new(),
                    };
                    ColumnValue::Array(kind, items)
                }
                FieldKind::Collection(ElementKind::Record(_)) => return None,
            };
            Some((field.column(), value))
        })
        .collect()
}

/// Columns of `after` whose value differs from `before`
pub fn changed_columns(
    before: &[(&'static str, ColumnValue)],
    after: Vec<(&'static str, ColumnValue)>,
) -> Vec<(&'static str, ColumnValue)> {
    after
        .into_iter()
        .filter(|column| !before.contains(column))
        .collect()
}

fn column_value(kind: ScalarKind, value: &Value<'_>) -> ColumnValue {
    scalar_of(kind, value).map_or(ColumnValue::Null(kind), ColumnValue::Scalar)
}

fn scalar_of(kind: ScalarKind, value: &Value<'_>) -> Option<Scalar> {
    let scalar = match value {
        Value::Text(text) => Scalar::Text((*text).to_string()),
        Value::Integer(value) => Scalar::Integer(*value),
        Value::Float(value) => Scalar::Float(*value),
        Value::Boolean(value) => Scalar::Boolean(*value),
        Value::Uuid(value) => Scalar::Uuid(*value),
        Value::DateTime(value) => Scalar::DateTime(*value),
        Value::Duration(value) => Scalar::Duration(*value),
        Value::Null | Value::Record(_) | Value::List(_) => return None,
    };
    if scalar.kind() != kind {
        tracing::warn!(%kind, found = %scalar.kind(), "Record value does not match registered kind");
    }
    Some(scalar)
}

/// Row a predicate is evaluated against
enum Scope {
    /// A table row
    Row {
        alias: String,
        schema: &'static Schema,
    },
    /// An `UNNEST`ed array element, exposed as `alias.value`
    Element(String),
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column(alias: &str, column: &str) -> String {
    format!("{}.{}", quote(alias), quote(column))
}

fn comparable(left: ScalarKind, right: ScalarKind) -> bool {
    let numeric = |kind| matches!(kind, ScalarKind::Integer | ScalarKind::Float);
    left == right || (numeric(left) && numeric(right))
}

/// Statement under construction
pub(crate) struct Statement {
    builder: QueryBuilder<'static, Postgres>,
    schema: &'static Schema,
    aliases: usize,
}

impl Statement {
    fn new(schema: &'static Schema, init: String) -> Self {
        Self {
            builder: QueryBuilder::new(init),
            schema,
            // t0 is the scope row
            aliases: 1,
        }
    }

    /// `SELECT t0.* ... WHERE filter`
    pub(crate) fn select(schema: &'static Schema, filter: &Predicate) -> Self {
        let mut statement = Self::new(
            schema,
            format!(
                "SELECT \"t0\".* FROM {} AS \"t0\" WHERE ",
                quote(schema.table())
            ),
        );
        statement.push_filter(filter);
        statement
    }

    /// `SELECT t0.* ... WHERE id = $1 AND scope`
    pub(crate) fn find(schema: &'static Schema, id: i64, scope: &Predicate) -> Self {
        let mut statement = Self::new(
            schema,
            format!(
                "SELECT \"t0\".* FROM {} AS \"t0\" WHERE {} = ",
                quote(schema.table()),
                column("t0", schema.id_field().column())
            ),
        );
        statement.builder.push_bind(id);
        if !scope.is_true() {
            statement.builder.push(" AND ");
            statement.push_filter(scope);
        }
        statement
    }

    /// `SELECT COUNT(*) ... WHERE filter`
    pub(crate) fn count(schema: &'static Schema, filter: &Predicate) -> Self {
        let mut statement = Self::new(
            schema,
            format!(
                "SELECT COUNT(*) FROM {} AS \"t0\" WHERE ",
                quote(schema.table())
            ),
        );
        statement.push_filter(filter);
        statement
    }

    /// Flag matching rows deleted at `at`
    pub(crate) fn soft_delete(
        schema: &'static Schema,
        fields: SoftDeleteFields,
        filter: &Predicate,
        at: NaiveDateTime,
    ) -> Self {
        let flag = schema.field(fields.flag).map_or(fields.flag, |f| f.column());
        let deleted_at = schema
            .field(fields.deleted_at)
            .map_or(fields.deleted_at, |f| f.column());

        let mut statement = Self::new(
            schema,
            format!(
                "UPDATE {} AS \"t0\" SET {} = TRUE, {} = ",
                quote(schema.table()),
                quote(flag),
                quote(deleted_at)
            ),
        );
        statement.builder.push_bind(at);
        statement.builder.push(" WHERE ");
        statement.push_filter(filter);
        statement
    }

    /// `INSERT ... RETURNING id`
    pub(crate) fn insert(schema: &'static Schema, columns: &[(&'static str, ColumnValue)]) -> Self {
        let id = quote(schema.id_field().column());
        let table = quote(schema.table());
        if columns.is_empty() {
            return Self::new(
                schema,
                format!("INSERT INTO {table} DEFAULT VALUES RETURNING {id}"),
            );
        }

        let names: Vec<String> = columns.iter().map(|(name, _)| quote(name)).collect();
        let mut statement = Self::new(
            schema,
            format!("INSERT INTO {table} ({}) VALUES (", names.join(", ")),
        );
        for (index, (_, value)) in columns.iter().enumerate() {
            if index > 0 {
                statement.builder.push(", ");
            }
            statement.bind_column(value);
        }
        statement.builder.push(format!(") RETURNING {id}"));
        statement
    }

    /// `UPDATE ... SET columns WHERE id = $n`
    pub(crate) fn update(
        schema: &'static Schema,
        id: i64,
        columns: &[(&'static str, ColumnValue)],
    ) -> Self {
        let id_column = quote(schema.id_field().column());
        let mut statement = Self::new(schema, format!("UPDATE {} SET ", quote(schema.table())));
        if columns.is_empty() {
            // existence check only
            statement.builder.push(format!("{id_column} = {id_column}"));
        }
        for (index, (name, value)) in columns.iter().enumerate() {
            if index > 0 {
                statement.builder.push(", ");
            }
            statement.builder.push(format!("{} = ", quote(name)));
            statement.bind_column(value);
        }
        statement.builder.push(format!(" WHERE {id_column} = "));
        statement.builder.push_bind(id);
        statement
    }

    /// Append `ORDER BY`, with identity as the tie-breaker
    pub(crate) fn order_by(&mut self, order: &OrderBy) {
        let scope = self.root();
        let expression = self.path_sql(&order.path, &scope);
        let direction = match order.direction {
            SortDirection::Asc => "ASC NULLS FIRST",
            SortDirection::Desc => "DESC NULLS LAST",
        };
        self.builder
            .push(format!(" ORDER BY {expression} {direction}"));

        let id = self.schema.id_field();
        let is_id = order.path.via.is_empty()
            && order.path.leaf.is_some_and(|leaf| leaf.column() == id.column());
        if !is_id {
            self.builder
                .push(format!(", {} ASC", column("t0", id.column())));
        }
    }

    /// Append `LIMIT` and `OFFSET`
    pub(crate) fn window(&mut self, window: Window) {
        self.builder.push(" LIMIT ");
        self.builder
            .push_bind(i64::try_from(window.limit).unwrap_or(i64::MAX));
        self.builder.push(" OFFSET ");
        self.builder
            .push_bind(i64::try_from(window.offset).unwrap_or(i64::MAX));
    }

    /// Rendered SQL text
    pub(crate) fn sql(&self) -> &str {
        self.builder.sql()
    }

    pub(crate) fn into_builder(self) -> QueryBuilder<'static, Postgres> {
        self.builder
    }

    fn root(&self) -> Scope {
        Scope::Row {
            alias: "t0".to_string(),
            schema: self.schema,
        }
    }

    fn alias(&mut self) -> String {
        let alias = format!("t{}", self.aliases);
        self.aliases += 1;
        alias
    }

    fn push_filter(&mut self, filter: &Predicate) {
        let scope = self.root();
        self.push_predicate(filter, &scope);
    }

    fn push_predicate(&mut self, predicate: &Predicate, scope: &Scope) {
        match predicate {
            Predicate::True => {
                self.builder.push("TRUE");
            }
            Predicate::IsNull(operand) => {
                let expression = self.operand_sql(operand, scope);
                self.builder.push(format!("{expression} IS NULL"));
            }
            Predicate::IsNotNull(operand) => {
                let expression = self.operand_sql(operand, scope);
                self.builder.push(format!("{expression} IS NOT NULL"));
            }
            Predicate::Contains(operand, needle) => {
                let expression = self.operand_sql(operand, scope);
                self.builder.push(format!("STRPOS(LOWER({expression}), "));
                self.builder.push_bind(needle.clone());
                self.builder.push(") > 0");
            }
            Predicate::In(operand, members) => {
                if members.is_empty() {
                    self.builder.push("FALSE");
                    return;
                }
                let expression = self.operand_sql(operand, scope);
                if operand.kind() == ScalarKind::Text {
                    self.builder.push(format!("LOWER({expression}) IN ("));
                } else {
                    self.builder.push(format!("{expression} IN ("));
                }
                for (index, member) in members.iter().enumerate() {
                    if index > 0 {
                        self.builder.push(", ");
                    }
                    self.bind_scalar(member);
                }
                self.builder.push(")");
            }
            Predicate::Between(operand, low, high) => {
                let expression = self.operand_sql(operand, scope);
                self.builder.push(format!("({expression} BETWEEN "));
                self.bind_scalar(low);
                self.builder.push(" AND ");
                self.bind_scalar(high);
                self.builder.push(")");
            }
            Predicate::Eq(operand, expected) => {
                if !comparable(operand.kind(), expected.kind()) {
                    self.builder.push("FALSE");
                    return;
                }
                let expression = self.operand_sql(operand, scope);
                self.builder.push(format!("{expression} = "));
                self.bind_scalar(expected);
            }
            Predicate::Any {
                via,
                collection,
                inner,
            } => self.push_exists(via, *collection, inner, scope),
            Predicate::And(predicates) => self.push_joined(predicates, " AND ", "TRUE", scope),
            Predicate::Or(predicates) => self.push_joined(predicates, " OR ", "FALSE", scope),
        }
    }

    fn push_joined(
        &mut self,
        predicates: &[Predicate],
        separator: &str,
        empty: &str,
        scope: &Scope,
    ) {
        match predicates {
            [] => {
                self.builder.push(empty);
            }
            [only] => self.push_predicate(only, scope),
            _ => {
                self.builder.push("(");
                for (index, predicate) in predicates.iter().enumerate() {
                    if index > 0 {
                        self.builder.push(separator);
                    }
                    self.push_predicate(predicate, scope);
                }
                self.builder.push(")");
            }
        }
    }

    fn push_exists(
        &mut self,
        via: &[FieldRef],
        collection: FieldRef,
        inner: &Predicate,
        scope: &Scope,
    ) {
        let Scope::Row { alias, schema } = scope else {
            self.builder.push("FALSE");
            return;
        };

        let mut owner = alias.clone();
        let mut owner_schema = *schema;
        let mut from = Vec::new();
        let mut conditions = Vec::new();

        for hop in via {
            let FieldKind::Reference(target) = hop.kind() else {
                self.builder.push("FALSE");
                return;
            };
            let target = target();
            let hop_alias = self.alias();
            from.push(format!("{} AS {}", quote(target.table()), quote(&hop_alias)));
            conditions.push(format!(
                "{} = {}",
                column(&hop_alias, target.id_field().column()),
                column(&owner, hop.column())
            ));
            owner = hop_alias;
            owner_schema = target;
        }

        let inner_scope = match collection.kind() {
            FieldKind::Collection(ElementKind::Record(element)) => {
                let element = element();
                let element_alias = self.alias();
                from.push(format!(
                    "{} AS {}",
                    quote(element.table()),
                    quote(&element_alias)
                ));
                conditions.push(format!(
                    "{} = {}",
                    column(&element_alias, collection.column()),
                    column(&owner, owner_schema.id_field().column())
                ));
                Scope::Row {
                    alias: element_alias,
                    schema: element,
                }
            }
            FieldKind::Collection(ElementKind::Scalar(_)) => {
                let element_alias = self.alias();
                from.push(format!(
                    "UNNEST({}) AS {}(\"value\")",
                    column(&owner, collection.column()),
                    quote(&element_alias)
                ));
                Scope::Element(element_alias)
            }
            _ => {
                self.builder.push("FALSE");
                return;
            }
        };

        self.builder
            .push(format!("EXISTS (SELECT 1 FROM {} WHERE ", from.join(", ")));
        for condition in &conditions {
            self.builder.push(format!("{condition} AND "));
        }
        self.push_predicate(inner, &inner_scope);
        self.builder.push(")");
    }

    fn operand_sql(&mut self, operand: &Operand, scope: &Scope) -> String {
        match operand {
            Operand::Path(path) => self.path_sql(path, scope),
            Operand::Concat(first, second) => {
                let first = self.path_sql(first, scope);
                let second = self.path_sql(second, scope);
                format!("CONCAT({first}, ' ', {second})")
            }
        }
    }

    fn path_sql(&mut self, path: &ScalarPath, scope: &Scope) -> String {
        let alias = match scope {
            Scope::Element(alias) => {
                return if path.via.is_empty() && path.leaf.is_none() {
                    column(alias, "value")
                } else {
                    "NULL".to_string()
                };
            }
            Scope::Row { alias, .. } => alias.clone(),
        };
        let Some(leaf) = path.leaf else {
            return "NULL".to_string();
        };
        if path.via.is_empty() {
            return column(&alias, leaf.column());
        }

        let mut from = String::new();
        let mut correlation = String::new();
        let mut owner = alias;
        for (index, hop) in path.via.iter().enumerate() {
            let FieldKind::Reference(target) = hop.kind() else {
                return "NULL".to_string();
            };
            let target = target();
            let hop_alias = self.alias();
            let on = format!(
                "{} = {}",
                column(&hop_alias, target.id_field().column()),
                column(&owner, hop.column())
            );
            if index == 0 {
                from = format!("{} AS {}", quote(target.table()), quote(&hop_alias));
                correlation = on;
            } else {
                from.push_str(&format!(
                    " JOIN {} AS {} ON {on}",
                    quote(target.table()),
                    quote(&hop_alias)
                ));
            }
            owner = hop_alias;
        }
        format!(
            "(SELECT {} FROM {from} WHERE {correlation})",
            column(&owner, leaf.column())
        )
    }

    fn bind_scalar(&mut self, scalar: &Scalar) {
        match scalar {
            Scalar::Text(value) => self.builder.push_bind(value.clone()),
            Scalar::Integer(value) => self.builder.push_bind(*value),
            Scalar::Float(value) => self.builder.push_bind(*value),
            Scalar::Boolean(value) => self.builder.push_bind(*value),
            Scalar::Uuid(value) => self.builder.push_bind(*value),
            Scalar::DateTime(value) => self.builder.push_bind(*value),
            Scalar::Duration(value) => self.builder.push_bind(*value),
        };
    }

    fn bind_column(&mut self, value: &ColumnValue) {
        match value {
            ColumnValue::Scalar(scalar) => self.bind_scalar(scalar),
            ColumnValue::Null(kind) => {
                match kind {
                    ScalarKind::Text => self.builder.push_bind(None::<String>),
                    ScalarKind::Integer => self.builder.push_bind(None::<i64>),
                    ScalarKind::Float => self.builder.push_bind(None::<f64>),
                    ScalarKind::Boolean => self.builder.push_bind(None::<bool>),
                    ScalarKind::Uuid => self.builder.push_bind(None::<uuid::Uuid>),
                    ScalarKind::DateTime => self.builder.push_bind(None::<NaiveDateTime>),
                    ScalarKind::Duration => self.builder.push_bind(None::<chrono::TimeDelta>),
                };
            }
            ColumnValue::Array(kind, items) => self.bind_array(*kind, items),
        }
    }

    fn bind_array(&mut self, kind: ScalarKind, items: &[Scalar]) {
        macro_rules! collect {
            ($variant:ident) => {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Scalar::$variant(value) => Some(value.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            };
        }

        match kind {
            ScalarKind::Text => self.builder.push_bind(collect!(Text)),
            ScalarKind::Integer => self.builder.push_bind(collect!(Integer)),
            ScalarKind::Float => self.builder.push_bind(collect!(Float)),
            ScalarKind::Boolean => self.builder.push_bind(collect!(Boolean)),
            ScalarKind::Uuid => self.builder.push_bind(collect!(Uuid)),
            ScalarKind::DateTime => self.builder.push_bind(collect!(DateTime)),
            ScalarKind::Duration => self.builder.push_bind(collect!(Duration)),
        };
    }
}
