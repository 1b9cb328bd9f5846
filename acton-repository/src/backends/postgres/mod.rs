//! PostgreSQL record store
//!
//! [`PgStore`] wraps a `sqlx` pool. Each [`PgSession`] renders [`Predicate`]
//! trees to parameterised SQL, queues writes, and persists them in one
//! transaction on [`save_changes`](StoreSession::save_changes).
//!
//! Record types opt in through [`PgEntity`], which adds row decoding to
//! [`Entity`]. Writable columns are derived from the schema by default.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_repository::backends::postgres::PgStore;
//! use acton_repository::config::Config;
//! use acton_repository::repository::GenericRepository;
//!
//! let config = Config::load()?;
//! let store = PgStore::connect(config.database.as_ref().unwrap()).await?;
//! let mut repo = GenericRepository::open(&store).with_pagination(config.pagination);
//! ```

mod pool;
mod sql;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::query::{Predicate, StoreQuery};
use crate::record::{Entity, SoftDelete};
use crate::repository::{RecordStore, RepositoryError, RepositoryResult, SaveSummary, StoreSession};
use crate::schema::Schema;

pub use sql::{changed_columns, entity_columns, ColumnValue};

use sql::Statement;

/// A record type stored in PostgreSQL
pub trait PgEntity: Entity + for<'r> FromRow<'r, PgRow> + Unpin {
    /// Column values written on insert and update
    fn columns(&self) -> Vec<(&'static str, ColumnValue)> {
        entity_columns(Self::schema(), self)
    }
}

/// Shared PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl fmt::Debug for PgStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgStore")
            .field("size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl PgStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with retries and exponential backoff
    pub async fn connect(config: &DatabaseConfig) -> crate::error::Result<Self> {
        tracing::debug!(url = %pool::sanitize_connection_url(&config.url), "Connecting record store");
        Ok(Self::new(pool::create_pool(config).await?))
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl RecordStore for PgStore {
    type Session = PgSession;

    fn session(&self) -> PgSession {
        PgSession {
            pool: self.pool.clone(),
            pending: Vec::new(),
            tracked: HashMap::new(),
        }
    }
}

#[derive(Debug)]
enum PendingWrite {
    Insert {
        schema: &'static Schema,
        columns: Vec<(&'static str, ColumnValue)>,
    },
    Update {
        schema: &'static Schema,
        id: i64,
        columns: Vec<(&'static str, ColumnValue)>,
    },
}

/// Unit of work over a [`PgStore`]
pub struct PgSession {
    pool: PgPool,
    pending: Vec<PendingWrite>,
    tracked: HashMap<(TypeId, i64), Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for PgSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgSession")
            .field("pending", &self.pending.len())
            .field("tracked", &self.tracked.len())
            .finish_non_exhaustive()
    }
}

impl PgSession {
    /// Number of queued writes
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }
}

impl<T: PgEntity> StoreSession<T> for PgSession {
    async fn find(
        &mut self,
        id: i64,
        scope: &Predicate,
        tracking: bool,
    ) -> RepositoryResult<Option<T>> {
        let mut query = Statement::find(T::schema(), id, scope).into_builder();
        let found = query.build_query_as::<T>().fetch_optional(&self.pool).await?;

        if tracking {
            if let Some(record) = &found {
                StoreSession::<T>::track(self, record);
            }
        }
        Ok(found)
    }

    async fn count(&mut self, filter: &Predicate) -> RepositoryResult<u64> {
        let mut query = Statement::count(T::schema(), filter).into_builder();
        let count = query.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn fetch(&mut self, query: &StoreQuery) -> RepositoryResult<Vec<T>> {
        let mut statement = Statement::select(T::schema(), &query.filter);
        if let Some(order) = &query.order {
            statement.order_by(order);
        }
        if let Some(window) = query.window {
            statement.window(window);
        }
        debug!(sql = statement.sql(), "Fetching records");

        let mut builder = statement.into_builder();
        let records = builder.build_query_as::<T>().fetch_all(&self.pool).await?;
        Ok(records)
    }

    fn add(&mut self, record: T) {
        self.pending.push(PendingWrite::Insert {
            schema: T::schema(),
            columns: record.columns(),
        });
    }

    fn mark_updated(&mut self, record: T) {
        self.pending.push(PendingWrite::Update {
            schema: T::schema(),
            id: record.id(),
            columns: record.columns(),
        });
    }

    fn track(&mut self, record: &T) {
        self.tracked
            .insert((TypeId::of::<T>(), record.id()), Box::new(record.clone()));
    }

    fn detect_changes(&mut self, record: T) -> bool {
        let key = (TypeId::of::<T>(), record.id());
        let Some(snapshot) = self
            .tracked
            .get_mut(&key)
            .and_then(|snapshot| snapshot.downcast_mut::<T>())
        else {
            debug!(entity = T::schema().name(), id = record.id(), "Record is not tracked");
            return false;
        };

        if *snapshot == record {
            return false;
        }

        let changed = changed_columns(&snapshot.columns(), record.columns());
        *snapshot = record.clone();

        if changed.is_empty() {
            debug!(entity = T::schema().name(), id = record.id(), "No changed columns to write");
            return false;
        }
        self.pending.push(PendingWrite::Update {
            schema: T::schema(),
            id: record.id(),
            columns: changed,
        });
        true
    }

    fn discard_changes(&mut self) {
        self.pending.clear();
    }

    async fn save_changes(&mut self) -> RepositoryResult<SaveSummary> {
        let pending = std::mem::take(&mut self.pending);
        let mut summary = SaveSummary::default();
        if pending.is_empty() {
            return Ok(summary);
        }

        let mut tx = self.pool.begin().await?;
        for write in &pending {
            match write {
                PendingWrite::Insert { schema, columns } => {
                    let mut builder = Statement::insert(*schema, columns).into_builder();
                    let id = builder.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;
                    summary.inserted_ids.push(id);
                }
                PendingWrite::Update {
                    schema,
                    id,
                    columns,
                } => {
                    let mut builder = Statement::update(*schema, *id, columns).into_builder();
                    let result = builder.build().execute(&mut *tx).await?;
                    summary.updated += result.rows_affected();
                }
            }
        }
        tx.commit().await?;

        debug!(
            inserted = summary.inserted_ids.len(),
            updated = summary.updated,
            "Saved session changes"
        );
        Ok(summary)
    }

    async fn soft_delete(&mut self, filter: &Predicate, at: NaiveDateTime) -> RepositoryResult<u64>
    where
        T: SoftDelete,
    {
        let schema = T::schema();
        let fields = schema.soft_delete().ok_or_else(|| {
            RepositoryError::database_error(
                crate::repository::RepositoryOperation::Delete,
                "Record type is not registered for soft deletion",
            )
            .with_entity_type(schema.name())
        })?;

        let mut builder = Statement::soft_delete(schema, fields, filter, at).into_builder();
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;
    use sqlx::Row;

    use super::*;
    use crate::query::Scalar;
    use crate::testing::{sample_products, Product};

    impl<'r> FromRow<'r, PgRow> for Product {
        fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
            Ok(Self {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                price: row.try_get("price")?,
                stock: row.try_get("stock")?,
                sku: row.try_get("sku")?,
                created_at: row.try_get("created_at")?,
                lead_time: None,
                category: None,
                tags: Vec::new(),
                labels: row.try_get("labels")?,
                is_deleted: row.try_get("is_deleted")?,
                deleted_at: row.try_get("deleted_at")?,
            })
        }
    }

    impl PgEntity for Product {}

    fn lazy_session() -> PgSession {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://catalog@localhost/catalog")
            .unwrap();
        PgStore::new(pool).session()
    }

    fn keyboard() -> Product {
        let mut keyboard = sample_products().remove(0);
        keyboard.id = 1;
        keyboard
    }

    #[tokio::test]
    async fn test_detect_changes_queues_only_changed_columns() {
        let mut session = lazy_session();
        let keyboard = keyboard();
        StoreSession::<Product>::track(&mut session, &keyboard);

        let mut edited = keyboard.clone();
        edited.price = 79.0;
        assert!(StoreSession::<Product>::detect_changes(&mut session, edited.clone()));
        assert_eq!(session.pending_writes(), 1);
        match &session.pending[0] {
            PendingWrite::Update { id, columns, .. } => {
                assert_eq!(*id, 1);
                assert_eq!(
                    columns,
                    &vec![("price", ColumnValue::Scalar(Scalar::Float(79.0)))]
                );
            }
            other => panic!("unexpected write {other:?}"),
        }

        // snapshot was refreshed
        assert!(!StoreSession::<Product>::detect_changes(&mut session, edited));
        assert_eq!(session.pending_writes(), 1);
    }

    #[tokio::test]
    async fn test_detect_changes_without_column_diff() {
        let mut session = lazy_session();
        let keyboard = keyboard();
        StoreSession::<Product>::track(&mut session, &keyboard);

        let mut retagged = keyboard.clone();
        retagged.tags.clear();
        assert!(!StoreSession::<Product>::detect_changes(&mut session, retagged.clone()));
        assert_eq!(session.pending_writes(), 0);

        let mut untracked = keyboard;
        untracked.id = 2;
        assert!(!StoreSession::<Product>::detect_changes(&mut session, untracked));

        retagged.stock = 3;
        assert!(StoreSession::<Product>::detect_changes(&mut session, retagged));
        assert_eq!(session.pending_writes(), 1);

        StoreSession::<Product>::discard_changes(&mut session);
        assert_eq!(session.pending_writes(), 0);
    }
}
