//! # Local Cache Store
//!
//! The persistent key-value table of product records plus its metadata row.
//! Pure storage: it never decides when to sync and never validates records.
//!
//! ## Lazy, Shared Initialization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    initialize() under concurrency                       │
//! │                                                                         │
//! │  search A ──┐                                                          │
//! │  search B ──┼──► OnceCell<Database>::get_or_try_init(open + migrate)   │
//! │  listener ──┘          │                                                │
//! │                        ├── first caller opens the pool                  │
//! │                        └── the others await it and reuse the handle     │
//! │                                                                         │
//! │  A failed open leaves the cell empty, so the next call retries.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation calls `initialize()` first, so callers never have to.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use catalog_core::{CacheMetadata, Clock, ProductRecord, SystemClock};

use crate::error::{DbError, DbResult};
use crate::pool::{Database, DbConfig};
use crate::repository::product_cache::ProductCacheRepository;

/// Local persistent cache of product records.
///
/// ## Usage
/// ```rust,ignore
/// let store = ProductCacheStore::new(DbConfig::new("./catalog-cache.db"));
/// store.put_all(&records).await?;
/// let cached = store.get_all().await?;
/// ```
pub struct ProductCacheStore {
    config: DbConfig,
    db: OnceCell<Database>,
    clock: Arc<dyn Clock>,
}

impl ProductCacheStore {
    /// Creates a store that opens `config` on first use.
    pub fn new(config: DbConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a store whose `last_updated` stamps come from `clock`.
    pub fn with_clock(config: DbConfig, clock: Arc<dyn Clock>) -> Self {
        ProductCacheStore {
            config,
            db: OnceCell::new(),
            clock,
        }
    }

    /// Wraps an already-open database.
    pub fn from_database(db: Database, clock: Arc<dyn Clock>) -> Self {
        ProductCacheStore {
            config: DbConfig::in_memory(),
            db: OnceCell::new_with(Some(db)),
            clock,
        }
    }

    /// Opens (creating if needed) the record and metadata tables.
    ///
    /// Idempotent and safe to call concurrently: only the first caller opens
    /// the database, later callers get the same handle.
    pub async fn initialize(&self) -> DbResult<&Database> {
        self.db
            .get_or_try_init(|| async {
                let db = Database::new(self.config.clone()).await?;
                info!(
                    path = %self.config.database_path.display(),
                    "Product cache store initialized"
                );
                Ok::<_, DbError>(db)
            })
            .await
    }

    /// Returns true once the store has been opened.
    pub fn is_initialized(&self) -> bool {
        self.db.initialized()
    }

    async fn repo(&self) -> DbResult<ProductCacheRepository> {
        Ok(self.initialize().await?.product_cache())
    }

    /// Upserts every record by id and sets `last_updated = now`, atomically.
    ///
    /// Existing records are replaced whole, never merged field by field.
    pub async fn put_all(&self, records: &[ProductRecord]) -> DbResult<usize> {
        let now = self.clock.now();
        let written = self.repo().await?.upsert_all(records, now).await?;
        debug!(records = written, last_updated = %now, "Cache put_all committed");
        Ok(written)
    }

    /// Replaces the cached set with `records` and sets `last_updated = now`,
    /// atomically. Records not in `records` are dropped.
    pub async fn replace_all(&self, records: &[ProductRecord]) -> DbResult<usize> {
        let now = self.clock.now();
        let written = self.repo().await?.replace_all(records, now).await?;
        debug!(records = written, last_updated = %now, "Cache replace_all committed");
        Ok(written)
    }

    /// Returns every cached record, in no particular order.
    pub async fn get_all(&self) -> DbResult<Vec<ProductRecord>> {
        self.repo().await?.list_all().await
    }

    /// Gets one cached record.
    pub async fn get(&self, id: &str) -> DbResult<Option<ProductRecord>> {
        self.repo().await?.get_by_id(id).await
    }

    /// Returns the metadata row; `None` before the first successful write.
    pub async fn get_metadata(&self) -> DbResult<Option<CacheMetadata>> {
        self.repo().await?.metadata().await
    }

    /// Number of cached records.
    pub async fn count(&self) -> DbResult<i64> {
        self.repo().await?.count().await
    }

    /// Atomically empties the record table and the metadata row.
    pub async fn clear(&self) -> DbResult<()> {
        self.repo().await?.clear().await?;
        info!("Product cache cleared");
        Ok(())
    }

    /// Closes the underlying pool if it was ever opened.
    pub async fn close(&self) {
        if let Some(db) = self.db.get() {
            db.close().await;
        }
    }
}

impl std::fmt::Debug for ProductCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductCacheStore")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
    }

    fn store_with(clock: Arc<ManualClock>) -> ProductCacheStore {
        ProductCacheStore::with_clock(DbConfig::in_memory(), clock)
    }

    #[tokio::test]
    async fn test_concurrent_initialize_shares_one_handle() {
        let store = Arc::new(store_with(clock()));

        let (a, b, c) = tokio::join!(store.initialize(), store.initialize(), store.initialize());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert!(std::ptr::eq(a, b));
        assert!(std::ptr::eq(b, c));
        assert!(store.is_initialized());
    }

    #[tokio::test]
    async fn test_put_all_twice_keeps_one_record() {
        let store = store_with(clock());
        let record = ProductRecord::new("p-1", "Maple Co", Utc::now()).with_categories(["Food"]);

        store.put_all(&[record.clone()]).await.unwrap();
        store.put_all(&[record.clone()]).await.unwrap();

        assert_eq!(store.get_all().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_put_all_stamps_clock_time() {
        let clock = clock();
        let store = store_with(clock.clone());
        assert!(store.get_metadata().await.unwrap().is_none());

        clock.advance(Duration::seconds(42));
        store.put_all(&[]).await.unwrap();

        let meta = store.get_metadata().await.unwrap().unwrap();
        assert_eq!(meta.last_updated, clock.now());
    }

    #[tokio::test]
    async fn test_store_accepts_records_the_write_path_would_reject() {
        let store = store_with(clock());
        let invalid = ProductRecord::new("p-x", "", Utc::now());

        store.put_all(&[invalid.clone()]).await.unwrap();

        assert_eq!(store.get("p-x").await.unwrap(), Some(invalid));
    }

    #[tokio::test]
    async fn test_clear_removes_records_and_metadata() {
        let store = store_with(clock());
        store
            .put_all(&[ProductRecord::new("p-1", "A", Utc::now())])
            .await
            .unwrap();

        store.clear().await.unwrap();

        assert!(store.get_all().await.unwrap().is_empty());
        assert!(store.get_metadata().await.unwrap().is_none());
    }

    /// Store holding one record, with a trigger that aborts any insert of
    /// `id = 'rejected'`.
    async fn store_with_rejecting_trigger(
        clock: Arc<ManualClock>,
    ) -> (ProductCacheStore, ProductRecord, Option<CacheMetadata>) {
        let store = store_with(clock.clone());
        let first = ProductRecord::new("p-1", "A", Utc::now());
        store.put_all(&[first.clone()]).await.unwrap();
        let before = store.get_metadata().await.unwrap();

        let db = store.initialize().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_record BEFORE INSERT ON product_cache \
             WHEN NEW.id = 'rejected' \
             BEGIN SELECT RAISE(ABORT, 'record rejected'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        clock.advance(Duration::seconds(60));
        (store, first, before)
    }

    #[tokio::test]
    async fn test_failed_put_all_leaves_records_and_metadata() {
        let (store, first, before) = store_with_rejecting_trigger(clock()).await;
        assert!(before.is_some());

        let result = store
            .put_all(&[
                ProductRecord::new("p-2", "B", Utc::now()),
                ProductRecord::new("rejected", "C", Utc::now()),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(store.get_all().await.unwrap(), vec![first]);
        assert_eq!(store.get_metadata().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_failed_replace_all_leaves_records_and_metadata() {
        let (store, first, before) = store_with_rejecting_trigger(clock()).await;

        let result = store
            .replace_all(&[
                ProductRecord::new("p-3", "D", Utc::now()),
                ProductRecord::new("rejected", "E", Utc::now()),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(store.get_all().await.unwrap(), vec![first]);
        assert_eq!(store.get_metadata().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_missing_table_surfaces_as_query_failure() {
        let store = store_with(clock());
        let db = store.initialize().await.unwrap();
        sqlx::query("DROP TABLE product_cache")
            .execute(db.pool())
            .await
            .unwrap();

        let err = store
            .put_all(&[ProductRecord::new("p-2", "B", Utc::now())])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }
}
