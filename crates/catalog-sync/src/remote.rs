//! # Remote Source Adapter
//!
//! The seam between the cache and the remote document store.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RemoteSource                                     │
//! │                                                                         │
//! │  fetch_all()                 every product document                    │
//! │  fetch_modified_since(t)     documents with modifiedAt > t (strict)    │
//! │  subscribe()                 ChangeFeed of record batches              │
//! │                                                                         │
//! │  ChangeFeed = mpsc::Receiver<Vec<ProductRecord>>                       │
//! │  Dropping the receiver ends the remote subscription.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`InMemoryRemote`] is a complete in-process implementation. It backs the
//! offline CLI and every test in this workspace.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use catalog_core::ProductRecord;

use crate::error::RemoteFetchError;

/// Buffered batches per subscriber before `push_batch` waits.
const FEED_CAPACITY: usize = 64;

/// Stream of changed-record batches from a standing subscription.
pub type ChangeFeed = mpsc::Receiver<Vec<ProductRecord>>;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteFetchError>;

/// A queryable remote product collection with change subscriptions.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetches every product document.
    async fn fetch_all(&self) -> RemoteResult<Vec<ProductRecord>>;

    /// Fetches documents whose `modifiedAt` is strictly after `since`.
    async fn fetch_modified_since(&self, since: DateTime<Utc>) -> RemoteResult<Vec<ProductRecord>>;

    /// Opens a standing subscription on the whole collection.
    async fn subscribe(&self) -> RemoteResult<ChangeFeed>;
}

// =============================================================================
// In-Memory Remote
// =============================================================================

/// In-process remote collection.
///
/// Counts every call, can be told to fail, and can hold fetches until
/// released so tests can line up concurrent callers.
///
/// ```rust,ignore
/// let remote = InMemoryRemote::with_records(records);
/// remote.fail_next(RemoteFetchError::unavailable("offline"));
/// assert!(remote.fetch_all().await.is_err());
/// assert_eq!(remote.fetch_all_calls(), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryRemote {
    records: Mutex<HashMap<String, ProductRecord>>,
    subscribers: Mutex<Vec<mpsc::Sender<Vec<ProductRecord>>>>,
    fail_next: Mutex<Option<RemoteFetchError>>,
    unavailable: Mutex<Option<String>>,
    paused: watch::Sender<bool>,
    last_since: Mutex<Option<DateTime<Utc>>>,
    fetch_all_calls: AtomicUsize,
    fetch_since_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        InMemoryRemote {
            records: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            unavailable: Mutex::new(None),
            paused: watch::channel(false).0,
            last_since: Mutex::new(None),
            fetch_all_calls: AtomicUsize::new(0),
            fetch_since_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = ProductRecord>) -> Self {
        let remote = Self::new();
        for record in records {
            remote.upsert(record);
        }
        remote
    }

    // =========================================================================
    // Remote-Side Mutations
    // =========================================================================

    /// Creates or replaces a document without notifying subscribers.
    pub fn upsert(&self, record: ProductRecord) {
        lock(&self.records).insert(record.id.clone(), record);
    }

    /// Removes a document without notifying subscribers.
    pub fn remove(&self, id: &str) -> Option<ProductRecord> {
        lock(&self.records).remove(id)
    }

    /// Number of documents in the collection.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upserts `records` and delivers them as one batch to every live
    /// subscriber. Returns the number of subscribers reached.
    pub async fn push_batch(&self, records: Vec<ProductRecord>) -> usize {
        for record in &records {
            self.upsert(record.clone());
        }

        let senders: Vec<_> = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.retain(|tx| !tx.is_closed());
            subscribers.clone()
        };

        let mut delivered = 0;
        for tx in senders {
            if tx.send(records.clone()).await.is_ok() {
                delivered += 1;
            }
        }

        debug!(records = records.len(), subscribers = delivered, "Pushed change batch");
        delivered
    }

    /// Number of subscriptions whose feed is still open.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    // =========================================================================
    // Failure Injection
    // =========================================================================

    /// Makes the next fetch (of either kind) fail with `err`.
    pub fn fail_next(&self, err: RemoteFetchError) {
        *lock(&self.fail_next) = Some(err);
    }

    /// Makes every call fail as unavailable until `set_available` is called.
    pub fn set_unavailable(&self, reason: impl Into<String>) {
        *lock(&self.unavailable) = Some(reason.into());
    }

    pub fn set_available(&self) {
        *lock(&self.unavailable) = None;
    }

    /// Holds every fetch at its start until [`resume`](Self::resume).
    /// Calls are counted before they wait.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn take_failure(&self) -> RemoteResult<()> {
        if let Some(reason) = lock(&self.unavailable).clone() {
            return Err(RemoteFetchError::Unavailable(reason));
        }
        match lock(&self.fail_next).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn wait_until_resumed(&self) {
        let mut rx = self.paused.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    // =========================================================================
    // Call Accounting
    // =========================================================================

    pub fn fetch_all_calls(&self) -> usize {
        self.fetch_all_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_since_calls(&self) -> usize {
        self.fetch_since_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Total fetches of either kind.
    pub fn total_fetches(&self) -> usize {
        self.fetch_all_calls() + self.fetch_since_calls()
    }

    /// The `since` argument of the most recent delta fetch.
    pub fn last_since(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_since)
    }

    pub fn reset_counts(&self) {
        self.fetch_all_calls.store(0, Ordering::SeqCst);
        self.fetch_since_calls.store(0, Ordering::SeqCst);
        self.subscribe_calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteSource for InMemoryRemote {
    async fn fetch_all(&self) -> RemoteResult<Vec<ProductRecord>> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_until_resumed().await;
        self.take_failure()?;

        let mut records: Vec<ProductRecord> = lock(&self.records).values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn fetch_modified_since(&self, since: DateTime<Utc>) -> RemoteResult<Vec<ProductRecord>> {
        self.fetch_since_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_since) = Some(since);
        self.wait_until_resumed().await;
        self.take_failure()?;

        let mut records: Vec<ProductRecord> = lock(&self.records)
            .values()
            .filter(|record| record.modified_at() > since)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.modified_at().cmp(&b.modified_at()).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn subscribe(&self) -> RemoteResult<ChangeFeed> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = lock(&self.unavailable).clone() {
            warn!(reason = %reason, "Subscription refused, remote unavailable");
            return Err(RemoteFetchError::Unavailable(reason));
        }

        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        lock(&self.subscribers).push(tx);
        Ok(rx)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
