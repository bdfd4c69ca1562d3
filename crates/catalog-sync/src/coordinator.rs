//! # Sync Coordinator
//!
//! Decides, per query, whether the local cache is fresh enough to serve, and
//! performs a delta or full reload when it is not.
//!
//! ## Two Freshness Clocks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  lastUpdated   (cache_metadata row, data level)                        │
//! │      written by every successful put_all: full sync, non-empty delta,  │
//! │      live listener batch                                               │
//! │                                                                         │
//! │  lastSyncTime  (this coordinator, process level)                       │
//! │      written only when a reload against the remote succeeds, even if   │
//! │      the delta came back empty                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Decision Table
//! ```text
//! ┌──────────────────────────────┬─────────────────────────────────────────┐
//! │ Condition                    │ Action                                  │
//! ├──────────────────────────────┼─────────────────────────────────────────┤
//! │ no metadata                  │ full: fetch_all, put_all                │
//! │ now - lastUpdated ≥ stale    │ full                                    │
//! │ now - base ≥ delta interval  │ delta: fetch_modified_since(base),      │
//! │   base = lastSyncTime,       │   put_all only if non-empty             │
//! │   else lastUpdated           │                                         │
//! │ otherwise                    │ fresh: no remote call                   │
//! └──────────────────────────────┴─────────────────────────────────────────┘
//! ```
//!
//! A failed fetch or write leaves both the cache and `lastSyncTime` as they
//! were and returns the error to the caller.
//!
//! ## Single Flight
//! With `coalesce_in_flight` on, concurrent callers that reach the same kind
//! of reload share one `Shared` future instead of each hitting the remote.
//! The map only holds a weak handle: the future removes its entry when it
//! completes, and a reload whose callers have all gone away (for example
//! after an external timeout) is dropped, so the next caller starts afresh.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, WeakShared};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use catalog_core::{Clock, ProductRecord, SearchCriteria, DEFAULT_COUNTRY};
use catalog_db::ProductCacheStore;

use crate::error::SyncResult;
use crate::remote::RemoteSource;

// =============================================================================
// Freshness Policy
// =============================================================================

/// Age thresholds that trigger reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    /// Cache age at or beyond which a full reload happens.
    pub stale_threshold: Duration,
    /// Time since the last reload at or beyond which a delta reload happens.
    pub delta_interval: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        FreshnessPolicy {
            stale_threshold: Duration::from_secs(3600),
            delta_interval: Duration::from_secs(300),
        }
    }
}

impl FreshnessPolicy {
    pub fn new(stale_threshold: Duration, delta_interval: Duration) -> Self {
        FreshnessPolicy {
            stale_threshold,
            delta_interval,
        }
    }

    /// Decides what kind of reload, if any, the cache needs at `now`.
    ///
    /// `last_updated` is the metadata row, `last_sync` the coordinator's own
    /// clock. Timestamps in the future count as age zero.
    pub fn decide(
        &self,
        now: DateTime<Utc>,
        last_updated: Option<DateTime<Utc>>,
        last_sync: Option<DateTime<Utc>>,
    ) -> SyncDecision {
        let Some(last_updated) = last_updated else {
            return SyncDecision::Full;
        };

        if age(now, last_updated) >= self.stale_threshold {
            return SyncDecision::Full;
        }

        let base = last_sync.unwrap_or(last_updated);
        if age(now, base) >= self.delta_interval {
            SyncDecision::Delta { since: base }
        } else {
            SyncDecision::Fresh
        }
    }

    /// True when data written at `last_updated` is younger than the stale
    /// threshold at `now`.
    pub fn is_valid(&self, now: DateTime<Utc>, last_updated: DateTime<Utc>) -> bool {
        age(now, last_updated) < self.stale_threshold
    }
}

fn age(now: DateTime<Utc>, then: DateTime<Utc>) -> Duration {
    (now - then).to_std().unwrap_or(Duration::ZERO)
}

/// What [`FreshnessPolicy::decide`] concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Serve the cache as is.
    Fresh,
    /// Fetch records modified after `since`.
    Delta { since: DateTime<Utc> },
    /// Fetch the whole collection.
    Full,
}

impl SyncDecision {
    pub fn kind(&self) -> Option<SyncKind> {
        match self {
            SyncDecision::Fresh => None,
            SyncDecision::Delta { .. } => Some(SyncKind::Delta),
            SyncDecision::Full => Some(SyncKind::Full),
        }
    }
}

// =============================================================================
// Sync Kinds and Outcomes
// =============================================================================

/// The two kinds of reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Full,
    Delta,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncKind::Full => write!(f, "full"),
            SyncKind::Delta => write!(f, "delta"),
        }
    }
}

/// Result of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Reload performed; `None` when the cache was fresh.
    pub kind: Option<SyncKind>,
    /// Records written to the store by this reload.
    pub records_written: usize,
    /// The new `lastSyncTime`, when a reload ran.
    pub synced_at: Option<DateTime<Utc>>,
}

impl SyncOutcome {
    pub fn fresh() -> Self {
        SyncOutcome {
            kind: None,
            records_written: 0,
            synced_at: None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.kind.is_none()
    }
}

/// Reload behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Full reloads replace the cached set instead of upserting into it.
    pub prune_on_full_sync: bool,
    /// Concurrent callers share one in-flight reload per kind.
    pub coalesce_in_flight: bool,
    /// Country given to fetched records that arrive without one.
    pub default_country: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            prune_on_full_sync: false,
            coalesce_in_flight: true,
            default_country: DEFAULT_COUNTRY.to_string(),
        }
    }
}

// =============================================================================
// Sync Coordinator
// =============================================================================

type InFlight = WeakShared<BoxFuture<'static, SyncResult<SyncOutcome>>>;

#[derive(Debug, Clone, Copy)]
enum SyncPlan {
    Full,
    Delta { since: DateTime<Utc> },
}

impl SyncPlan {
    fn kind(&self) -> SyncKind {
        match self {
            SyncPlan::Full => SyncKind::Full,
            SyncPlan::Delta { .. } => SyncKind::Delta,
        }
    }
}

struct Inner {
    store: Arc<ProductCacheStore>,
    remote: Arc<dyn RemoteSource>,
    clock: Arc<dyn Clock>,
    policy: FreshnessPolicy,
    options: SyncOptions,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    in_flight: Mutex<HashMap<SyncKind, InFlight>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps the local cache fresh against a remote source.
///
/// Cheap to clone; clones share the same `lastSyncTime` and in-flight map.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<ProductCacheStore>,
        remote: Arc<dyn RemoteSource>,
        clock: Arc<dyn Clock>,
        policy: FreshnessPolicy,
        options: SyncOptions,
    ) -> Self {
        SyncCoordinator {
            inner: Arc::new(Inner {
                store,
                remote,
                clock,
                policy,
                options,
                last_sync: Mutex::new(None),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.inner.policy
    }

    /// Instant the last successful reload started, if any in this process.
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *lock(&self.inner.last_sync)
    }

    /// Forgets `lastSyncTime`, so the next check falls back to `lastUpdated`.
    pub fn reset(&self) {
        *lock(&self.inner.last_sync) = None;
        debug!("Sync coordinator reset");
    }

    /// Makes sure the cache is fresh enough to answer `criteria`.
    ///
    /// Performs zero, one delta or one full reload. Errors from the remote
    /// or the store propagate unchanged.
    pub async fn ensure_fresh(&self, criteria: &SearchCriteria) -> SyncResult<SyncOutcome> {
        let now = self.inner.clock.now();
        let metadata = self.inner.store.get_metadata().await?;
        let last_sync = self.last_sync_time();

        let decision = self.inner.policy.decide(
            now,
            metadata.map(|m| m.last_updated),
            last_sync,
        );
        debug!(
            ?decision,
            last_updated = ?metadata.map(|m| m.last_updated),
            last_sync = ?last_sync,
            filtered = !criteria.is_empty(),
            "Freshness decision"
        );

        match decision {
            SyncDecision::Fresh => Ok(SyncOutcome::fresh()),
            SyncDecision::Delta { since } => self.run(SyncPlan::Delta { since }).await,
            SyncDecision::Full => self.run(SyncPlan::Full).await,
        }
    }

    /// Forces a reload regardless of freshness.
    ///
    /// A forced delta with nothing to measure from runs as a full reload.
    pub async fn sync_now(&self, kind: SyncKind) -> SyncResult<SyncOutcome> {
        let plan = match kind {
            SyncKind::Full => SyncPlan::Full,
            SyncKind::Delta => {
                let base = match self.last_sync_time() {
                    Some(t) => Some(t),
                    None => self
                        .inner
                        .store
                        .get_metadata()
                        .await?
                        .map(|m| m.last_updated),
                };
                match base {
                    Some(since) => SyncPlan::Delta { since },
                    None => {
                        info!("No previous sync to measure from, running full sync");
                        SyncPlan::Full
                    }
                }
            }
        };

        self.run(plan).await
    }

    async fn run(&self, plan: SyncPlan) -> SyncResult<SyncOutcome> {
        if !self.inner.options.coalesce_in_flight {
            return self.execute(plan).await;
        }

        let kind = plan.kind();
        let shared = {
            let mut in_flight = lock(&self.inner.in_flight);
            match in_flight.get(&kind).and_then(|weak| weak.upgrade()) {
                Some(existing) => {
                    debug!(kind = %kind, "Joining in-flight sync");
                    existing
                }
                None => {
                    let this = self.clone();
                    let fut = async move {
                        let result = this.execute(plan).await;
                        lock(&this.inner.in_flight).remove(&kind);
                        result
                    }
                    .boxed()
                    .shared();
                    match fut.downgrade() {
                        Some(weak) => {
                            in_flight.insert(kind, weak);
                        }
                        None => {
                            in_flight.remove(&kind);
                        }
                    }
                    fut
                }
            }
        };

        shared.await
    }

    async fn execute(&self, plan: SyncPlan) -> SyncResult<SyncOutcome> {
        let started_at = self.inner.clock.now();
        let kind = plan.kind();

        let written = match plan {
            SyncPlan::Full => {
                info!("Full sync starting");
                let records = self.normalize(self.inner.remote.fetch_all().await.map_err(|e| {
                    warn!(kind = %kind, error = %e, "Remote fetch failed");
                    e
                })?);

                if self.inner.options.prune_on_full_sync {
                    self.inner.store.replace_all(&records).await?
                } else {
                    self.inner.store.put_all(&records).await?
                }
            }
            SyncPlan::Delta { since } => {
                debug!(since = %since, "Delta sync starting");
                let records = self.normalize(
                    self.inner
                        .remote
                        .fetch_modified_since(since)
                        .await
                        .map_err(|e| {
                            warn!(kind = %kind, error = %e, "Remote fetch failed");
                            e
                        })?,
                );

                if records.is_empty() {
                    0
                } else {
                    self.inner.store.put_all(&records).await?
                }
            }
        };

        self.advance_last_sync(started_at);
        info!(kind = %kind, records = written, "Sync complete");

        Ok(SyncOutcome {
            kind: Some(kind),
            records_written: written,
            synced_at: Some(started_at),
        })
    }

    fn normalize(&self, records: Vec<ProductRecord>) -> Vec<ProductRecord> {
        records
            .into_iter()
            .map(|record| record.normalize_country(&self.inner.options.default_country))
            .collect()
    }

    fn advance_last_sync(&self, to: DateTime<Utc>) {
        let mut last_sync = lock(&self.inner.last_sync);
        if last_sync.map_or(true, |current| to > current) {
            *last_sync = Some(to);
        }
    }
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("policy", &self.inner.policy)
            .field("options", &self.inner.options)
            .field("last_sync", &self.last_sync_time())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn ago(secs: i64) -> DateTime<Utc> {
        now() - ChronoDuration::seconds(secs)
    }

    fn policy() -> FreshnessPolicy {
        FreshnessPolicy::new(Duration::from_secs(5000), Duration::from_secs(300))
    }

    #[test]
    fn test_absent_metadata_means_full() {
        assert_eq!(policy().decide(now(), None, None), SyncDecision::Full);
        assert_eq!(policy().decide(now(), None, Some(ago(1))), SyncDecision::Full);
    }

    #[test]
    fn test_stale_threshold_is_inclusive() {
        assert_eq!(policy().decide(now(), Some(ago(5000)), Some(ago(1))), SyncDecision::Full);
        assert_eq!(policy().decide(now(), Some(ago(4999)), Some(ago(1))), SyncDecision::Fresh);
    }

    #[test]
    fn test_delta_measured_from_last_sync() {
        assert_eq!(
            policy().decide(now(), Some(ago(4999)), Some(ago(301))),
            SyncDecision::Delta { since: ago(301) }
        );
        assert_eq!(
            policy().decide(now(), Some(ago(4999)), Some(ago(299))),
            SyncDecision::Fresh
        );
    }

    #[test]
    fn test_delta_falls_back_to_last_updated() {
        assert_eq!(
            policy().decide(now(), Some(ago(300)), None),
            SyncDecision::Delta { since: ago(300) }
        );
        assert_eq!(policy().decide(now(), Some(ago(10)), None), SyncDecision::Fresh);
    }

    #[test]
    fn test_future_timestamps_count_as_fresh() {
        let ahead = now() + ChronoDuration::seconds(60);
        assert_eq!(policy().decide(now(), Some(ahead), Some(ahead)), SyncDecision::Fresh);
        assert!(policy().is_valid(now(), ahead));
    }

    #[test]
    fn test_is_valid_uses_stale_threshold() {
        assert!(policy().is_valid(now(), ago(4999)));
        assert!(!policy().is_valid(now(), ago(5000)));
    }

    #[test]
    fn test_decision_kind() {
        assert_eq!(SyncDecision::Fresh.kind(), None);
        assert_eq!(SyncDecision::Full.kind(), Some(SyncKind::Full));
        assert_eq!(
            SyncDecision::Delta { since: now() }.kind(),
            Some(SyncKind::Delta)
        );
        assert_eq!(SyncKind::Delta.to_string(), "delta");
    }

    // =========================================================================
    // Single Flight
    // =========================================================================

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use catalog_core::ManualClock;
    use catalog_db::DbConfig;

    use crate::remote::{ChangeFeed, InMemoryRemote, RemoteResult};

    /// Remote whose first full fetch never resolves.
    struct HangingRemote {
        inner: InMemoryRemote,
        hung: AtomicBool,
    }

    #[async_trait]
    impl RemoteSource for HangingRemote {
        async fn fetch_all(&self) -> RemoteResult<Vec<ProductRecord>> {
            let first = !self.hung.swap(true, Ordering::SeqCst);
            let result = self.inner.fetch_all().await;
            if first {
                std::future::pending::<()>().await;
            }
            result
        }

        async fn fetch_modified_since(&self, since: DateTime<Utc>) -> RemoteResult<Vec<ProductRecord>> {
            self.inner.fetch_modified_since(since).await
        }

        async fn subscribe(&self) -> RemoteResult<ChangeFeed> {
            self.inner.subscribe().await
        }
    }

    async fn hanging_coordinator() -> (SyncCoordinator, Arc<HangingRemote>) {
        let clock = Arc::new(ManualClock::new(now()));
        let remote = Arc::new(HangingRemote {
            inner: InMemoryRemote::with_records([ProductRecord::new("p-1", "Maple Co", ago(10))]),
            hung: AtomicBool::new(false),
        });
        let store = Arc::new(ProductCacheStore::with_clock(DbConfig::in_memory(), clock.clone()));
        store.initialize().await.unwrap();
        let coordinator = SyncCoordinator::new(
            store,
            remote.clone(),
            clock,
            policy(),
            SyncOptions::default(),
        );
        (coordinator, remote)
    }

    #[tokio::test]
    async fn test_abandoned_sync_does_not_block_later_callers() {
        let (coordinator, remote) = hanging_coordinator().await;
        let criteria = SearchCriteria::new();

        let first = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            coordinator.ensure_fresh(&criteria),
        )
        .await;
        assert!(first.is_err());
        assert_eq!(remote.inner.fetch_all_calls(), 1);
        assert!(coordinator.last_sync_time().is_none());

        let second = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            coordinator.ensure_fresh(&criteria),
        )
            .await
            .expect("second sync should not join the abandoned one")
            .unwrap();

        assert_eq!(second.kind, Some(SyncKind::Full));
        assert_eq!(second.records_written, 1);
        assert_eq!(remote.inner.fetch_all_calls(), 2);
        assert_eq!(coordinator.last_sync_time(), Some(now()));
    }

    #[tokio::test]
    async fn test_completed_sync_frees_its_slot() {
        let (coordinator, remote) = hanging_coordinator().await;
        remote.hung.store(true, Ordering::SeqCst);

        coordinator.sync_now(SyncKind::Full).await.unwrap();
        coordinator.sync_now(SyncKind::Full).await.unwrap();

        assert_eq!(remote.inner.fetch_all_calls(), 2);
        assert!(lock(&coordinator.inner.in_flight).is_empty());
    }
}
