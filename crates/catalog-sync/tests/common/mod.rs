//! Shared fixtures for the catalog integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use catalog_core::{Actor, ManualClock, ProductRecord};
use catalog_db::{DbConfig, ProductCacheStore};
use catalog_sync::{FreshnessPolicy, InMemoryRemote, ProductCatalog, SearchCriteria, SyncOptions};

/// Fixed starting instant for every test clock.
pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub fn secs(n: i64) -> ChronoDuration {
    ChronoDuration::seconds(n)
}

/// stale = 5000s, delta = 300s.
pub fn test_policy() -> FreshnessPolicy {
    FreshnessPolicy::new(Duration::from_secs(5000), Duration::from_secs(300))
}

/// A record last modified remotely at `modified`.
pub fn record(id: &str, name: &str, modified: DateTime<Utc>) -> ProductRecord {
    ProductRecord::new(id, name, modified - secs(3600)).modified(Actor::system(), modified)
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub remote: Arc<InMemoryRemote>,
    pub store: Arc<ProductCacheStore>,
    pub catalog: Arc<ProductCatalog>,
}

impl Harness {
    pub fn new(records: Vec<ProductRecord>) -> Self {
        Self::with_options(records, SyncOptions::default())
    }

    pub fn with_options(records: Vec<ProductRecord>, options: SyncOptions) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let remote = Arc::new(InMemoryRemote::with_records(records));
        let store = Arc::new(ProductCacheStore::with_clock(
            DbConfig::in_memory(),
            clock.clone(),
        ));
        let catalog = Arc::new(ProductCatalog::new(
            store.clone(),
            remote.clone(),
            clock.clone(),
            test_policy(),
            options,
        ));

        Harness {
            clock,
            remote,
            store,
            catalog,
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.clock.advance(secs(seconds));
    }

    pub fn now(&self) -> DateTime<Utc> {
        use catalog_core::Clock;
        self.clock.now()
    }

    pub async fn search_all(&self) -> Vec<ProductRecord> {
        self.catalog.search(&SearchCriteria::new()).await.unwrap()
    }

    pub async fn cached_names(&self) -> Vec<String> {
        self.catalog
            .search_cached(&SearchCriteria::new())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect()
    }
}

pub fn names(records: &[ProductRecord]) -> Vec<&str> {
    records.iter().map(|r| r.name.as_str()).collect()
}
