//! Store collaborator traits
//!
//! A [`RecordStore`] is a cheap, cloneable handle on shared storage (a pool,
//! shared tables). Each logical flow opens its own session from it; the session
//! queues writes and remembers tracked snapshots until [`save_changes`].
//!
//! Both traits use RPITIT (Return Position Impl Trait In Traits), so backends
//! implement them with plain `async fn`.
//!
//! [`save_changes`]: StoreSession::save_changes

use std::future::Future;

use chrono::NaiveDateTime;

use crate::query::{Predicate, StoreQuery};
use crate::record::{Entity, SoftDelete};

use super::RepositoryResult;

/// Outcome of persisting a session's queued writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Identities generated for queued inserts, in queue order
    pub inserted_ids: Vec<i64>,
    /// Rows changed by queued updates
    pub updated: u64,
}

/// Shared handle on a record store
pub trait RecordStore: Clone + Send + Sync + 'static {
    /// Per-flow unit of work
    type Session: Send;

    /// Open a fresh session
    fn session(&self) -> Self::Session;
}

/// One logical flow's access to records of type `T`
pub trait StoreSession<T: Entity>: Send {
    /// Look a record up by identity, restricted to records matching `scope`
    ///
    /// With `tracking`, the session keeps a snapshot for [`detect_changes`].
    ///
    /// [`detect_changes`]: StoreSession::detect_changes
    fn find(
        &mut self,
        id: i64,
        scope: &Predicate,
        tracking: bool,
    ) -> impl Future<Output = RepositoryResult<Option<T>>> + Send;

    /// Count records matching `filter`
    fn count(&mut self, filter: &Predicate) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Fetch records for a compiled query
    fn fetch(
        &mut self,
        query: &StoreQuery,
    ) -> impl Future<Output = RepositoryResult<Vec<T>>> + Send;

    /// Queue an insert
    fn add(&mut self, record: T);

    /// Queue a full update of the stored row with the record's identity
    fn mark_updated(&mut self, record: T);

    /// Register `record` as the tracked snapshot for its identity
    fn track(&mut self, record: &T);

    /// Queue an update if `record` differs from its tracked snapshot
    ///
    /// Returns whether an update was queued. Untracked records queue nothing.
    fn detect_changes(&mut self, record: T) -> bool;

    /// Drop queued writes without persisting them
    fn discard_changes(&mut self);

    /// Persist every queued write as one unit
    fn save_changes(&mut self) -> impl Future<Output = RepositoryResult<SaveSummary>> + Send;

    /// Flag every record matching `filter` as deleted at `at`
    ///
    /// Runs directly against storage without loading the records. Returns
    /// the number of rows affected.
    fn soft_delete(
        &mut self,
        filter: &Predicate,
        at: NaiveDateTime,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send
    where
        T: SoftDelete;
}
