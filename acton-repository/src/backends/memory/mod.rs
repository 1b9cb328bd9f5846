//! In-process record store
//!
//! [`MemoryStore`] keeps one table per record type behind a shared
//! `tokio::sync::RwLock`. Sessions evaluate [`Predicate`] trees directly
//! against [`Record`](crate::record::Record) accessors, so every query the
//! compilers produce works here without a database.
//!
//! Writes queue in the session and are applied under a single write lock on
//! [`save_changes`](crate::repository::StoreSession::save_changes).

mod eval;

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use crate::query::{Predicate, StoreQuery};
use crate::record::{Entity, SoftDelete, Value};
use crate::repository::{
    RecordStore, RepositoryError, RepositoryErrorKind, RepositoryOperation, RepositoryResult,
    SaveSummary, StoreSession,
};

struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Entity> Table<T> {
    fn insert(&mut self, mut record: T) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        record.set_id(id);
        self.rows.insert(id, record);
        id
    }
}

#[derive(Default)]
struct Tables(HashMap<TypeId, Box<dyn Any + Send + Sync>>);

impl Tables {
    fn table<T: Entity>(&self) -> Option<&Table<T>> {
        self.0
            .get(&TypeId::of::<T>())
            .and_then(|table| table.downcast_ref())
    }

    fn table_mut<T: Entity>(&mut self) -> RepositoryResult<&mut Table<T>> {
        self.0
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Table::<T>::default()))
            .downcast_mut()
            .ok_or_else(|| {
                RepositoryError::new(
                    RepositoryOperation::GetById,
                    RepositoryErrorKind::Other,
                    "Table registered under a different record type",
                )
                .with_entity_type(T::schema().name())
            })
    }
}

/// Shared in-memory tables
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert records directly, assigning identities in order
    ///
    /// Returns the assigned identities.
    pub async fn seed<T: Entity>(&self, records: Vec<T>) -> RepositoryResult<Vec<i64>> {
        let mut tables = self.tables.write().await;
        let table = tables.table_mut::<T>()?;
        let ids = records.into_iter().map(|record| table.insert(record)).collect();
        Ok(ids)
    }

    /// Every stored record of type `T`, soft-deleted ones included, in identity order
    pub async fn all<T: Entity>(&self) -> Vec<T> {
        let tables = self.tables.read().await;
        tables
            .table::<T>()
            .map(|table| table.rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl RecordStore for MemoryStore {
    type Session = MemorySession;

    fn session(&self) -> MemorySession {
        MemorySession {
            store: self.clone(),
            pending: Vec::new(),
            tracked: HashMap::new(),
        }
    }
}

enum WriteOutcome {
    Inserted(i64),
    Updated(bool),
}

type PendingWrite = Box<dyn FnOnce(&mut Tables) -> RepositoryResult<WriteOutcome> + Send>;

/// Unit of work over a [`MemoryStore`]
pub struct MemorySession {
    store: MemoryStore,
    pending: Vec<PendingWrite>,
    tracked: HashMap<(TypeId, i64), Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySession")
            .field("pending", &self.pending.len())
            .field("tracked", &self.tracked.len())
            .finish_non_exhaustive()
    }
}

impl MemorySession {
    /// Number of queued writes
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    fn queue_update<T: Entity>(&mut self, record: T) {
        self.pending.push(Box::new(move |tables: &mut Tables| -> RepositoryResult<WriteOutcome> {
            let table = tables.table_mut::<T>()?;
            match table.rows.get_mut(&record.id()) {
                Some(row) => {
                    *row = record;
                    Ok(WriteOutcome::Updated(true))
                }
                None => Ok(WriteOutcome::Updated(false)),
            }
        }));
    }
}

impl<T: Entity> StoreSession<T> for MemorySession {
    async fn find(
        &mut self,
        id: i64,
        scope: &Predicate,
        tracking: bool,
    ) -> RepositoryResult<Option<T>> {
        let found = {
            let tables = self.store.tables.read().await;
            tables
                .table::<T>()
                .and_then(|table| table.rows.get(&id))
                .filter(|record| eval::matches(scope, &Value::record(*record)))
                .cloned()
        };

        if tracking {
            if let Some(record) = &found {
                StoreSession::<T>::track(self, record);
            }
        }
        Ok(found)
    }

    async fn count(&mut self, filter: &Predicate) -> RepositoryResult<u64> {
        let tables = self.store.tables.read().await;
        let count = tables.table::<T>().map_or(0, |table| {
            table
                .rows
                .values()
                .filter(|record| eval::matches(filter, &Value::record(*record)))
                .count()
        });
        Ok(count as u64)
    }

    async fn fetch(&mut self, query: &StoreQuery) -> RepositoryResult<Vec<T>> {
        let tables = self.store.tables.read().await;
        let Some(table) = tables.table::<T>() else {
            return Ok(Vec::new());
        };

        let mut records: Vec<&T> = table
            .rows
            .values()
            .filter(|record| eval::matches(&query.filter, &Value::record(*record)))
            .collect();

        // stable, so ties keep identity order
        if let Some(order) = &query.order {
            records.sort_by(|left, right| {
                order.direction.apply(eval::order(
                    &order.path,
                    &Value::record(*left),
                    &Value::record(*right),
                ))
            });
        }

        let (offset, limit) = query.window.map_or((0, usize::MAX), |window| {
            (
                usize::try_from(window.offset).unwrap_or(usize::MAX),
                usize::try_from(window.limit).unwrap_or(usize::MAX),
            )
        });

        Ok(records
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn add(&mut self, record: T) {
        self.pending.push(Box::new(move |tables: &mut Tables| -> RepositoryResult<WriteOutcome> {
            let id = tables.table_mut::<T>()?.insert(record);
            Ok(WriteOutcome::Inserted(id))
        }));
    }

    fn mark_updated(&mut self, record: T) {
        self.queue_update(record);
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
        *snapshot = record.clone();
        self.queue_update(record);
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

        let mut tables = self.store.tables.write().await;
        for write in pending {
            match write(&mut *tables)? {
                WriteOutcome::Inserted(id) => summary.inserted_ids.push(id),
                WriteOutcome::Updated(true) => summary.updated += 1,
                WriteOutcome::Updated(false) => {}
            }
        }
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
        let mut tables = self.store.tables.write().await;
        let table = tables.table_mut::<T>()?;

        let mut affected = 0;
        for record in table.rows.values_mut() {
            if eval::matches(filter, &Value::record(&*record)) {
                record.mark_deleted(at);
                affected += 1;
            }
        }
        Ok(affected)
    }
}
