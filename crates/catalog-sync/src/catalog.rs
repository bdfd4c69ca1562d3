//! # Product Catalog
//!
//! The public API: search backed by the local cache, cache administration,
//! and live updates. Constructed explicitly and passed to whoever needs it.
//!
//! ## Search Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  search(criteria)                                                      │
//! │     │                                                                   │
//! │     ├─► SyncCoordinator::ensure_fresh   (0, 1 delta or 1 full reload)  │
//! │     │       └─ error? return it; caller may fall back to search_cached │
//! │     │                                                                   │
//! │     ├─► ProductCacheStore::get_all                                     │
//! │     │                                                                   │
//! │     └─► filter_and_sort(records, criteria)   (in memory, no network)   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use catalog_core::search::filter_and_sort;
use catalog_core::{CacheMetadata, Clock, ProductRecord, SearchCriteria, SystemClock};
use catalog_db::ProductCacheStore;

use crate::config::CatalogConfig;
use crate::coordinator::{FreshnessPolicy, SyncCoordinator, SyncKind, SyncOptions, SyncOutcome};
use crate::error::SyncResult;
use crate::listener::{LiveListener, Unsubscribe};
use crate::remote::RemoteSource;

/// Product search over a locally cached, incrementally synced collection.
///
/// ```rust,ignore
/// let catalog = ProductCatalog::open(&config, remote).await?;
///
/// let hits = catalog
///     .search(&SearchCriteria::new().term("maple").category("Food"))
///     .await?;
/// ```
pub struct ProductCatalog {
    store: Arc<ProductCacheStore>,
    coordinator: SyncCoordinator,
    listener: LiveListener,
    clock: Arc<dyn Clock>,
    background: Mutex<Option<Unsubscribe>>,
}

impl ProductCatalog {
    pub fn new(
        store: Arc<ProductCacheStore>,
        remote: Arc<dyn RemoteSource>,
        clock: Arc<dyn Clock>,
        policy: FreshnessPolicy,
        options: SyncOptions,
    ) -> Self {
        let listener = LiveListener::new(Arc::clone(&store), Arc::clone(&remote))
            .with_default_country(options.default_country.clone());
        let coordinator = SyncCoordinator::new(
            Arc::clone(&store),
            remote,
            Arc::clone(&clock),
            policy,
            options,
        );

        ProductCatalog {
            store,
            coordinator,
            listener,
            clock,
            background: Mutex::new(None),
        }
    }

    /// Builds a catalog from configuration without opening anything.
    pub fn from_config(
        config: &CatalogConfig,
        remote: Arc<dyn RemoteSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(ProductCacheStore::with_clock(
            config.db_config(),
            Arc::clone(&clock),
        ));
        Self::new(
            store,
            remote,
            clock,
            config.freshness_policy(),
            config.sync_options(),
        )
    }

    /// Builds a catalog from configuration, opens the cache, and starts live
    /// updates when `live_updates_on_start` is set.
    pub async fn open(config: &CatalogConfig, remote: Arc<dyn RemoteSource>) -> SyncResult<Self> {
        let catalog = Self::from_config(config, remote, Arc::new(SystemClock));
        catalog.store.initialize().await?;

        if config.sync.live_updates_on_start {
            let handle = catalog.listener.subscribe().await?;
            *catalog.background.lock().await = Some(handle);
        }

        info!(
            stale_threshold_secs = config.cache.stale_threshold_secs,
            delta_interval_secs = config.cache.delta_interval_secs,
            live = config.sync.live_updates_on_start,
            "Product catalog opened"
        );
        Ok(catalog)
    }

    // =========================================================================
    // Public API
    // =========================================================================

    /// Brings the cache up to date, then returns matching records ordered by
    /// name.
    ///
    /// Sync failures are returned as is. Serving stale data instead is the
    /// caller's call, through [`search_cached`](Self::search_cached).
    pub async fn search(&self, criteria: &SearchCriteria) -> SyncResult<Vec<ProductRecord>> {
        let outcome = self.coordinator.ensure_fresh(criteria).await?;
        if let Some(kind) = outcome.kind {
            debug!(kind = %kind, records = outcome.records_written, "Search refreshed cache");
        }
        self.search_cached(criteria).await
    }

    /// Filters the cache as it is, without contacting the remote.
    pub async fn search_cached(&self, criteria: &SearchCriteria) -> SyncResult<Vec<ProductRecord>> {
        let records = self.store.get_all().await?;
        let total = records.len();
        let results = filter_and_sort(records, criteria);
        debug!(total, matched = results.len(), "Search filtered cache");
        Ok(results)
    }

    /// Empties the cache and forgets when it last synced. The next search
    /// performs a full reload.
    pub async fn clear_cache(&self) -> SyncResult<()> {
        self.store.clear().await?;
        self.coordinator.reset();
        Ok(())
    }

    /// True when the cache has been written and is younger than the stale
    /// threshold.
    pub async fn is_cache_valid(&self) -> SyncResult<bool> {
        let valid = match self.store.get_metadata().await? {
            Some(CacheMetadata { last_updated }) => self
                .coordinator
                .policy()
                .is_valid(self.clock.now(), last_updated),
            None => false,
        };
        Ok(valid)
    }

    /// Opens a live subscription that writes remote changes into the cache
    /// until the returned handle is unsubscribed or dropped.
    pub async fn subscribe_to_live_updates(&self) -> SyncResult<Unsubscribe> {
        self.listener.subscribe().await
    }

    /// Forces a reload regardless of freshness.
    pub async fn sync_now(&self, kind: SyncKind) -> SyncResult<SyncOutcome> {
        self.coordinator.sync_now(kind).await
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn store(&self) -> &Arc<ProductCacheStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Cache metadata, `None` before the first write.
    pub async fn metadata(&self) -> SyncResult<Option<CacheMetadata>> {
        Ok(self.store.get_metadata().await?)
    }

    /// Stops live updates started by [`open`](Self::open) and closes the cache.
    pub async fn close(&self) {
        if let Some(mut handle) = self.background.lock().await.take() {
            handle.unsubscribe().await;
        }
        self.store.close().await;
        info!("Product catalog closed");
    }
}

impl std::fmt::Debug for ProductCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductCatalog")
            .field("store", &self.store)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemote;
    use catalog_core::ManualClock;
    use catalog_db::DbConfig;
    use chrono::{Duration, TimeZone, Utc};

    fn catalog(remote: Arc<InMemoryRemote>, clock: Arc<ManualClock>) -> ProductCatalog {
        let store = Arc::new(ProductCacheStore::with_clock(DbConfig::in_memory(), clock.clone()));
        ProductCatalog::new(
            store,
            remote,
            clock,
            FreshnessPolicy::default(),
            SyncOptions::default(),
        )
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
    }

    #[tokio::test]
    async fn test_cache_validity_follows_stale_threshold() {
        let clock = clock();
        let remote = Arc::new(InMemoryRemote::with_records([ProductRecord::new(
            "p-1",
            "Maple Co",
            clock.now(),
        )]));
        let catalog = catalog(remote, clock.clone());

        assert!(!catalog.is_cache_valid().await.unwrap());

        catalog.search(&SearchCriteria::new()).await.unwrap();
        assert!(catalog.is_cache_valid().await.unwrap());

        clock.advance(Duration::seconds(3599));
        assert!(catalog.is_cache_valid().await.unwrap());

        clock.advance(Duration::seconds(1));
        assert!(!catalog.is_cache_valid().await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_cache_forces_full_reload() {
        let clock = clock();
        let remote = Arc::new(InMemoryRemote::with_records([ProductRecord::new(
            "p-1",
            "Maple Co",
            clock.now(),
        )]));
        let catalog = catalog(remote.clone(), clock.clone());

        catalog.search(&SearchCriteria::new()).await.unwrap();
        catalog.clear_cache().await.unwrap();

        assert!(catalog.coordinator().last_sync_time().is_none());
        assert!(catalog.metadata().await.unwrap().is_none());
        assert!(catalog.search_cached(&SearchCriteria::new()).await.unwrap().is_empty());

        let results = catalog.search(&SearchCriteria::new()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(remote.fetch_all_calls(), 2);
        assert_eq!(remote.fetch_since_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_cached_never_calls_remote() {
        let clock = clock();
        let remote = Arc::new(InMemoryRemote::new());
        let catalog = catalog(remote.clone(), clock);

        assert!(catalog.search_cached(&SearchCriteria::new()).await.unwrap().is_empty());
        assert_eq!(remote.total_fetches(), 0);
    }
}
