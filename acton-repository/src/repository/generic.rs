//! Generic repository over any registered record type
//!
//! [`GenericRepository`] composes the query compilers with a store session.
//! One repository serves one logical flow; every method takes `&mut self`
//! and a [`CancellationToken`] that races the in-flight store round-trip.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_repository::backends::memory::MemoryStore;
//! use acton_repository::repository::{GenericRepository, PaginatedOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = MemoryStore::new();
//! let mut repo = GenericRepository::open(&store);
//! let cancel = CancellationToken::new();
//!
//! let id = repo.create(Product::new("Keyboard", 89.99), &cancel).await?;
//! let product: Product = repo.get_by_id(id, false, &cancel).await?;
//!
//! let options = PaginatedOptions::default().with_filter("name", "key");
//! let page = repo.get_paginated::<Product, ProductSummary>(&options, &cancel).await?;
//! ```

use std::future::Future;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PaginationConfig;
use crate::query::{
    FilterCompiler, Operand, PageResult, Paginator, Predicate, PredicateBuilder, Scalar,
    ScalarPath, SearchCompiler, Sorter, StoreQuery,
};
use crate::record::{Entity, SoftDelete};
use crate::schema::{ScalarKind, Schema};

use super::options::PaginatedOptions;
use super::store::{RecordStore, SaveSummary, StoreSession};
use super::{RepositoryError, RepositoryErrorKind, RepositoryOperation, RepositoryResult};

/// Filter, search, sort, paginate and persist any [`Entity`]
#[derive(Debug)]
pub struct GenericRepository<S> {
    session: S,
    filters: FilterCompiler,
    search: SearchCompiler,
    pagination: PaginationConfig,
}

impl<S> GenericRepository<S> {
    /// Repository over an already opened session
    pub fn new(session: S) -> Self {
        Self::with_builder(session, PredicateBuilder::new())
    }

    /// Repository whose compilers use `builder` (e.g. a pinned reference date)
    pub fn with_builder(session: S, builder: PredicateBuilder) -> Self {
        Self {
            session,
            filters: FilterCompiler::new(builder),
            search: SearchCompiler::new(builder),
            pagination: PaginationConfig::default(),
        }
    }

    /// Open a fresh session on `store`
    pub fn open<R>(store: &R) -> Self
    where
        R: RecordStore<Session = S>,
    {
        Self::new(store.session())
    }

    /// Apply page size defaults and limits
    #[must_use]
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// The underlying session
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    fn page_size(&self, requested: u32) -> u32 {
        let size = if requested == 0 {
            self.pagination.default_page_size
        } else {
            requested
        };
        match self.pagination.max_page_size {
            Some(max) if size > max => max,
            _ => size,
        }
    }

    /// Look one record up by identity
    ///
    /// Soft-deleted records are invisible. With `with_tracking`, the session
    /// keeps a snapshot so a later tracked [`update`](Self::update) persists
    /// only real changes.
    ///
    /// # Errors
    ///
    /// `NotFound` when no visible record has this identity.
    pub async fn get_by_id<T>(
        &mut self,
        id: i64,
        with_tracking: bool,
        cancel: &CancellationToken,
    ) -> RepositoryResult<T>
    where
        T: Entity,
        S: StoreSession<T>,
    {
        let schema = T::schema();
        debug!(entity = schema.name(), id, with_tracking, "Fetching record by id");

        let scope = live_scope(schema);
        let found = cancellable(
            cancel,
            RepositoryOperation::GetById,
            self.session.find(id, &scope, with_tracking),
        )
        .await
        .map_err(|e| e.with_entity(schema.name(), id.to_string()))?;

        found.ok_or_else(|| RepositoryError::not_found(schema.name(), id.to_string()))
    }

    /// One page of records matching filters and search, projected to `M`
    ///
    /// The count and the page are computed over the same predicate:
    /// filters AND search AND not deleted.
    pub async fn get_paginated<T, M>(
        &mut self,
        options: &PaginatedOptions,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PageResult<M>>
    where
        T: Entity,
        M: From<T>,
        S: StoreSession<T>,
    {
        let schema = T::schema();
        let mut filter = live_scope(schema).and(self.filters.compile(schema, &options.filters));
        if let Some(search) = options
            .search
            .as_ref()
            .and_then(|search| self.search.compile(schema, search))
        {
            filter = filter.and(search);
        }

        let page_number = options.page_number;
        let page_size = self.page_size(options.page_size);
        debug!(
            entity = schema.name(),
            page_number,
            page_size,
            filters = options.filters.len(),
            "Fetching paginated records"
        );

        let total = cancellable(cancel, RepositoryOperation::Count, self.session.count(&filter))
            .await
            .map_err(|e| e.with_entity_type(schema.name()))?;

        let query = Sorter::sort(
            StoreQuery::new(filter),
            schema,
            options.sort_by.as_deref(),
            options.direction.as_deref(),
        );
        let query = Paginator::window(query, page_number, page_size);

        let records = cancellable(
            cancel,
            RepositoryOperation::GetPaginated,
            self.session.fetch(&query),
        )
        .await
        .map_err(|e| e.with_entity_type(schema.name()))?;

        let items: Vec<M> = records.into_iter().map(M::from).collect();
        debug!(entity = schema.name(), total, returned = items.len(), "Paginated fetch complete");
        Ok(Paginator::assemble(items, total, page_number, page_size))
    }

    /// Insert a record and return its generated identity
    pub async fn create<T>(&mut self, record: T, cancel: &CancellationToken) -> RepositoryResult<i64>
    where
        T: Entity,
        S: StoreSession<T>,
    {
        let schema = T::schema();
        self.session.add(record);

        let summary = self.persist::<T>(RepositoryOperation::Create, cancel).await?;
        let id = summary.inserted_ids.first().copied().ok_or_else(|| {
            RepositoryError::new(
                RepositoryOperation::Create,
                RepositoryErrorKind::Other,
                "Store did not report a generated id",
            )
            .with_entity_type(schema.name())
        })?;

        info!(entity = schema.name(), id, "Record created");
        Ok(id)
    }

    /// Persist changes to an existing record
    ///
    /// With `has_tracking`, the record is diffed against the snapshot taken by
    /// a tracked [`get_by_id`](Self::get_by_id) and only a real change is
    /// written. Without it, the record is written as a full update.
    ///
    /// # Errors
    ///
    /// `NotFound` when an untracked update matches no stored row.
    pub async fn update<T>(
        &mut self,
        record: T,
        has_tracking: bool,
        cancel: &CancellationToken,
    ) -> RepositoryResult<()>
    where
        T: Entity,
        S: StoreSession<T>,
    {
        let schema = T::schema();
        let id = record.id();

        if has_tracking {
            if !self.session.detect_changes(record) {
                debug!(entity = schema.name(), id, "No tracked changes to persist");
            }
        } else {
            self.session.mark_updated(record);
        }

        let summary = self.persist::<T>(RepositoryOperation::Update, cancel).await?;
        if !has_tracking && summary.updated == 0 {
            warn!(entity = schema.name(), id, "Update matched no stored record");
            return Err(RepositoryError::not_found(schema.name(), id.to_string())
                .with_operation(RepositoryOperation::Update));
        }

        info!(entity = schema.name(), id, updated = summary.updated, "Record updated");
        Ok(())
    }

    /// Soft delete one record
    ///
    /// Returns `false` when no visible record has this identity.
    pub async fn delete<T>(&mut self, id: i64, cancel: &CancellationToken) -> RepositoryResult<bool>
    where
        T: SoftDelete,
        S: StoreSession<T>,
    {
        let schema = T::schema();
        let filter = live_scope(schema).and(Predicate::Eq(id_operand(schema), Scalar::Integer(id)));

        let affected = self
            .soft_delete::<T>(RepositoryOperation::Delete, &filter, cancel)
            .await
            .map_err(|e| e.with_entity(schema.name(), id.to_string()))?;

        info!(entity = schema.name(), id, affected, "Record soft deleted");
        Ok(affected > 0)
    }

    /// Soft delete every listed record that is not already deleted
    ///
    /// Returns the number of records affected.
    pub async fn delete_range<T>(
        &mut self,
        ids: &[i64],
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64>
    where
        T: SoftDelete,
        S: StoreSession<T>,
    {
        let schema = T::schema();
        if ids.is_empty() {
            return Ok(0);
        }

        let members = ids.iter().copied().map(Scalar::Integer).collect();
        let filter = live_scope(schema).and(Predicate::In(id_operand(schema), members));

        let affected = self
            .soft_delete::<T>(RepositoryOperation::DeleteRange, &filter, cancel)
            .await
            .map_err(|e| e.with_entity_type(schema.name()))?;

        info!(entity = schema.name(), requested = ids.len(), affected, "Records soft deleted");
        Ok(affected)
    }

    async fn soft_delete<T>(
        &mut self,
        operation: RepositoryOperation,
        filter: &Predicate,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64>
    where
        T: SoftDelete,
        S: StoreSession<T>,
    {
        let at = Utc::now().naive_utc();
        cancellable(cancel, operation, self.session.soft_delete(filter, at)).await
    }

    async fn persist<T>(
        &mut self,
        operation: RepositoryOperation,
        cancel: &CancellationToken,
    ) -> RepositoryResult<SaveSummary>
    where
        T: Entity,
        S: StoreSession<T>,
    {
        let result = cancellable(cancel, operation, self.session.save_changes()).await;
        if let Err(error) = &result {
            warn!(entity = T::schema().name(), %error, "Discarding unsaved changes");
            self.session.discard_changes();
        }
        result.map_err(|e| e.with_entity_type(T::schema().name()))
    }
}

/// Race a store round-trip against cancellation
async fn cancellable<F, R>(
    cancel: &CancellationToken,
    operation: RepositoryOperation,
    future: F,
) -> RepositoryResult<R>
where
    F: Future<Output = RepositoryResult<R>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(%operation, "Repository operation cancelled");
            Err(RepositoryError::cancelled(operation))
        }
        result = future => result.map_err(|e| e.with_operation(operation)),
    }
}

/// Records not yet soft deleted; everything for types without soft delete
fn live_scope(schema: &'static Schema) -> Predicate {
    let Some(soft_delete) = schema.soft_delete() else {
        return Predicate::True;
    };
    match schema.field(soft_delete.flag) {
        Some(flag) => Predicate::Eq(
            Operand::Path(ScalarPath::field(flag, ScalarKind::Boolean)),
            Scalar::Boolean(false),
        ),
        None => Predicate::True,
    }
}

fn id_operand(schema: &'static Schema) -> Operand {
    Operand::Path(ScalarPath::field(schema.id_field(), ScalarKind::Integer))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::backends::memory::MemoryStore;
    use crate::query::SearchOptions;
    use crate::testing::{product_schema, sample_products, Product, ProductSummary};

    async fn seeded() -> (MemoryStore, GenericRepository<crate::backends::memory::MemorySession>) {
        let store = MemoryStore::new();
        store.seed(sample_products()).await.unwrap();
        let repo = GenericRepository::with_builder(
            store.session(),
            PredicateBuilder::with_reference_date(NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()),
        );
        (store, repo)
    }

    fn names(page: &PageResult<ProductSummary>) -> Vec<&str> {
        page.items().iter().map(|item| item.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let (_store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let product: Product = repo.get_by_id(2, false, &cancel).await.unwrap();
        assert_eq!(product.name, "Wireless Mouse");
    }

    #[tokio::test]
    async fn test_get_by_id_hides_soft_deleted() {
        let (_store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let error = repo.get_by_id::<Product>(5, false, &cancel).await.unwrap_err();
        assert!(error.is_not_found());
        assert_eq!(error.entity_id.as_deref(), Some("5"));

        let error = repo.get_by_id::<Product>(99, false, &cancel).await.unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_get_paginated_excludes_soft_deleted() {
        let (_store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let page = repo
            .get_paginated::<Product, ProductSummary>(&PaginatedOptions::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(page.total_count(), 4);
        assert!(!names(&page).contains(&"Retired Webcam"));
    }

    #[tokio::test]
    async fn test_get_paginated_defaults_to_id_descending() {
        let (_store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let options = PaginatedOptions::default().with_sort("", "up");
        let page = repo
            .get_paginated::<Product, ProductSummary>(&options, &cancel)
            .await
            .unwrap();
        let ids: Vec<i64> = page.items().iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_get_paginated_filters_by_nested_collection() {
        let (_store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let options = PaginatedOptions::default()
            .with_filter("tags.name", "SALE")
            .with_sort("id", "asc");
        let page = repo
            .get_paginated::<Product, ProductSummary>(&options, &cancel)
            .await
            .unwrap();
        assert_eq!(names(&page), vec!["Mechanical Keyboard", "Desk Speaker"]);
        assert_eq!(page.total_count(), 2);
    }

    #[tokio::test]
    async fn test_get_paginated_ignores_reserved_keys_in_filters() {
        let (_store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let options = PaginatedOptions::from_query_pairs([
            ("pageNumber", "1"),
            ("pageSize", "1"),
            ("sortBy", "price"),
            ("direction", "asc"),
        ]);
        let page = repo
            .get_paginated::<Product, ProductSummary>(&options, &cancel)
            .await
            .unwrap();
        assert_eq!(page.total_count(), 4);
        assert_eq!(names(&page), vec!["Wireless Mouse"]);
        assert!(page.has_next());
    }

    #[tokio::test]
    async fn test_get_paginated_search_and_count() {
        let (_store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let options = PaginatedOptions::default()
            .with_search(SearchOptions::new("peripherals"))
            .with_sort("name", "asc");
        let page = repo
            .get_paginated::<Product, ProductSummary>(&options, &cancel)
            .await
            .unwrap();
        assert_eq!(page.total_count(), 2);
        assert_eq!(names(&page), vec!["Mechanical Keyboard", "Wireless Mouse"]);
    }

    #[tokio::test]
    async fn test_blank_search_leaves_results_unchanged() {
        let (_store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let options = PaginatedOptions::default().with_search(SearchOptions::new("  "));
        let page = repo
            .get_paginated::<Product, ProductSummary>(&options, &cancel)
            .await
            .unwrap();
        assert_eq!(page.total_count(), 4);
    }

    #[tokio::test]
    async fn test_get_paginated_second_page() {
        let (_store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let options = PaginatedOptions::default()
            .with_sort("id", "asc")
            .with_page(2, 3);
        let page = repo
            .get_paginated::<Product, ProductSummary>(&options, &cancel)
            .await
            .unwrap();
        assert_eq!(names(&page), vec!["Desk Speaker"]);
        assert!(page.has_previous());
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn test_page_size_limits() {
        let (_store, repo) = seeded().await;
        let mut repo = repo.with_pagination(PaginationConfig {
            default_page_size: 3,
            max_page_size: Some(2),
        });
        let cancel = CancellationToken::new();

        let page = repo
            .get_paginated::<Product, ProductSummary>(
                &PaginatedOptions::default().with_page(1, 50),
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(page.page_size(), 2);
        assert_eq!(page.items().len(), 2);

        assert_eq!(repo.page_size(0), 2);
    }

    #[tokio::test]
    async fn test_create_returns_generated_id() {
        let (store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let id = repo
            .create(Product::new("Monitor Arm", 45.0), &cancel)
            .await
            .unwrap();
        assert_eq!(id, 6);

        let stored = store.all::<Product>().await;
        assert_eq!(stored.len(), 6);
        assert_eq!(stored[5].id, 6);
    }

    #[tokio::test]
    async fn test_untracked_update_persists() {
        let (store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let mut mouse: Product = repo.get_by_id(2, false, &cancel).await.unwrap();
        mouse.stock = 99;
        repo.update(mouse, false, &cancel).await.unwrap();

        let stored = store.all::<Product>().await;
        assert_eq!(stored[1].stock, 99);
    }

    #[tokio::test]
    async fn test_untracked_update_of_missing_record() {
        let (_store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let ghost = Product {
            id: 42,
            ..Product::new("Ghost", 1.0)
        };
        let error = repo.update(ghost, false, &cancel).await.unwrap_err();
        assert!(error.is_not_found());
        assert_eq!(error.operation, RepositoryOperation::Update);
    }

    #[tokio::test]
    async fn test_tracked_update_persists_only_real_diff() {
        let (store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let keyboard: Product = repo.get_by_id(1, true, &cancel).await.unwrap();
        repo.update(keyboard.clone(), true, &cancel).await.unwrap();
        assert_eq!(store.all::<Product>().await[0], keyboard);

        let mut changed = keyboard.clone();
        changed.price = 79.99;
        repo.update(changed, true, &cancel).await.unwrap();
        assert_eq!(store.all::<Product>().await[0].price, 79.99);
    }

    #[tokio::test]
    async fn test_tracked_update_without_snapshot_writes_nothing() {
        let (store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let mut keyboard: Product = repo.get_by_id(1, false, &cancel).await.unwrap();
        keyboard.price = 1.0;
        repo.update(keyboard, true, &cancel).await.unwrap();
        assert_eq!(store.all::<Product>().await[0].price, 89.99);
    }

    #[tokio::test]
    async fn test_delete_is_scoped_to_id() {
        let (store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        assert!(repo.delete::<Product>(2, &cancel).await.unwrap());
        assert!(!repo.delete::<Product>(2, &cancel).await.unwrap());

        let stored = store.all::<Product>().await;
        let deleted: Vec<i64> = stored.iter().filter(|p| p.is_deleted).map(|p| p.id).collect();
        assert_eq!(deleted, vec![2, 5]);
        assert!(stored[1].deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_range_skips_already_deleted() {
        let (store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();

        let affected = repo
            .delete_range::<Product>(&[1, 3, 5, 77], &cancel)
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let stored = store.all::<Product>().await;
        assert_eq!(stored[4].deleted_at, sample_products()[4].deleted_at);
        assert_eq!(repo.delete_range::<Product>(&[], &cancel).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_completion() {
        let (store, mut repo) = seeded().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = repo
            .get_paginated::<Product, ProductSummary>(&PaginatedOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(error.operation, RepositoryOperation::Count);

        let error = repo
            .create(Product::new("Never", 1.0), &cancel)
            .await
            .unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(store.all::<Product>().await.len(), 5);

        // the discarded insert must not leak into the next save
        let live = CancellationToken::new();
        repo.create(Product::new("Later", 2.0), &live).await.unwrap();
        let stored = store.all::<Product>().await;
        assert_eq!(stored.len(), 6);
        assert_eq!(stored[5].name, "Later");
    }

    #[test]
    fn test_live_scope() {
        match live_scope(product_schema()) {
            Predicate::Eq(operand, Scalar::Boolean(false)) => {
                assert_eq!(operand.to_string(), "is_deleted");
            }
            other => panic!("unexpected scope: {other:?}"),
        }
        assert!(live_scope(crate::testing::category_schema()).is_true());
    }
}
