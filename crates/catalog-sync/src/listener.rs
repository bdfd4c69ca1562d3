//! # Live Invalidation Listener
//!
//! A standing subscription that writes remote changes into the local cache
//! as they happen, independent of the sync coordinator.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  subscribe() ──► remote.subscribe() ──► ChangeFeed                     │
//! │      │                                      │                           │
//! │      │ spawn                                ▼                           │
//! │      │                     ┌────────────────────────────────┐          │
//! │      └────────────────────►│ listener task                  │          │
//! │                            │  select! {                     │          │
//! │   Unsubscribe ──shutdown──►│    shutdown  => stop           │          │
//! │                            │    batch     => put_all(batch) │          │
//! │                            │    feed end  => stop           │          │
//! │                            │  }                             │          │
//! │                            └────────────────────────────────┘          │
//! │                                                                         │
//! │  Never touches lastSyncTime. Empty batches are skipped.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use catalog_core::{ProductRecord, DEFAULT_COUNTRY};
use catalog_db::ProductCacheStore;

use crate::error::SyncResult;
use crate::remote::{ChangeFeed, RemoteSource};

/// Opens live subscriptions that feed the cache store.
#[derive(Clone)]
pub struct LiveListener {
    store: Arc<ProductCacheStore>,
    remote: Arc<dyn RemoteSource>,
    default_country: String,
}

impl LiveListener {
    pub fn new(store: Arc<ProductCacheStore>, remote: Arc<dyn RemoteSource>) -> Self {
        LiveListener {
            store,
            remote,
            default_country: DEFAULT_COUNTRY.to_string(),
        }
    }

    /// Sets the country given to pushed records that arrive without one.
    pub fn with_default_country(mut self, country: impl Into<String>) -> Self {
        self.default_country = country.into();
        self
    }

    /// Starts delivering remote changes into the store.
    ///
    /// The store is opened first so a broken cache is reported here instead
    /// of inside the background task.
    pub async fn subscribe(&self) -> SyncResult<Unsubscribe> {
        self.store.initialize().await?;
        let feed = self.remote.subscribe().await?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(run_listener(
            Arc::clone(&self.store),
            feed,
            shutdown_rx,
            self.default_country.clone(),
        ));

        info!("Live updates subscribed");
        Ok(Unsubscribe {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

impl std::fmt::Debug for LiveListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveListener")
            .field("default_country", &self.default_country)
            .finish()
    }
}

async fn run_listener(
    store: Arc<ProductCacheStore>,
    mut feed: ChangeFeed,
    mut shutdown_rx: mpsc::Receiver<()>,
    default_country: String,
) {
    debug!("Live listener running");

    loop {
        tokio::select! {
            biased;

            // Also fires when the Unsubscribe handle is dropped.
            _ = shutdown_rx.recv() => {
                info!("Live listener received shutdown");
                break;
            }

            batch = feed.recv() => match batch {
                Some(records) if records.is_empty() => {
                    debug!("Ignoring empty change batch");
                }
                Some(records) => apply_batch(&store, records, &default_country).await,
                None => {
                    warn!("Change feed closed by remote");
                    break;
                }
            }
        }
    }

    debug!("Live listener stopped");
}

async fn apply_batch(store: &ProductCacheStore, records: Vec<ProductRecord>, default_country: &str) {
    let records: Vec<ProductRecord> = records
        .into_iter()
        .map(|record| record.normalize_country(default_country))
        .collect();

    match store.put_all(&records).await {
        Ok(written) => debug!(records = written, "Applied live change batch"),
        Err(e) => error!(records = records.len(), error = %e, "Failed to apply live change batch"),
    }
}

// =============================================================================
// Unsubscribe Handle
// =============================================================================

/// Handle that ends a live subscription.
///
/// Dropping it also stops delivery, but only [`unsubscribe`](Self::unsubscribe)
/// waits for an in-progress write to finish.
#[derive(Debug)]
pub struct Unsubscribe {
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Unsubscribe {
    /// Stops delivery. Once this returns no further writes happen.
    /// Calling it again does nothing.
    pub async fn unsubscribe(&mut self) {
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return;
        };

        // A closed channel means the task already ended on its own.
        let _ = shutdown_tx.send(()).await;

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Live listener task ended abnormally");
            }
        }

        info!("Live updates unsubscribed");
    }

    /// True until unsubscribed or until the feed ends.
    pub fn is_active(&self) -> bool {
        self.shutdown_tx.is_some()
            && self
                .task
                .as_ref()
                .map_or(false, |task| !task.is_finished())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemote;
    use catalog_db::DbConfig;
    use chrono::Utc;
    use std::time::Duration;

    async fn wait_for_count(store: &ProductCacheStore, expected: i64) {
        for _ in 0..200 {
            if store.count().await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("store never reached {} records", expected);
    }

    fn setup() -> (Arc<ProductCacheStore>, Arc<InMemoryRemote>, LiveListener) {
        let store = Arc::new(ProductCacheStore::new(DbConfig::in_memory()));
        let remote = Arc::new(InMemoryRemote::new());
        let listener = LiveListener::new(store.clone(), remote.clone());
        (store, remote, listener)
    }

    #[tokio::test]
    async fn test_batches_are_written_and_country_filled() {
        let (store, remote, listener) = setup();
        let mut handle = listener.subscribe().await.unwrap();

        remote
            .push_batch(vec![ProductRecord::new("p-1", "Maple Co", Utc::now())])
            .await;
        wait_for_count(&store, 1).await;

        let stored = store.get("p-1").await.unwrap().unwrap();
        assert_eq!(stored.location.country, DEFAULT_COUNTRY);
        assert!(handle.is_active());

        handle.unsubscribe().await;
    }

    #[tokio::test]
    async fn test_empty_batches_do_not_touch_metadata() {
        let store = Arc::new(ProductCacheStore::new(DbConfig::in_memory()));
        let (feed_tx, feed_rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);

        feed_tx.send(Vec::new()).await.unwrap();
        drop(feed_tx);

        // Returns once the closed feed is drained.
        run_listener(store.clone(), feed_rx, shutdown_rx, DEFAULT_COUNTRY.to_string()).await;

        assert!(store.get_metadata().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_listener_running() {
        let (store, remote, listener) = setup();
        let mut handle = listener.subscribe().await.unwrap();

        let db = store.initialize().await.unwrap();
        sqlx::query("DROP TABLE product_cache")
            .execute(db.pool())
            .await
            .unwrap();
        remote
            .push_batch(vec![ProductRecord::new("p-1", "A", Utc::now())])
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(handle.is_active());
        handle.unsubscribe().await;
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_writes_and_is_idempotent() {
        let (store, remote, listener) = setup();
        let mut handle = listener.subscribe().await.unwrap();

        handle.unsubscribe().await;
        handle.unsubscribe().await;
        assert!(!handle.is_active());

        remote
            .push_batch(vec![ProductRecord::new("p-1", "A", Utc::now())])
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(remote.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_listener() {
        let (_store, remote, listener) = setup();
        let handle = listener.subscribe().await.unwrap();
        assert_eq!(remote.subscriber_count(), 1);

        drop(handle);

        for _ in 0..200 {
            if remote.subscriber_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("listener kept its feed open after the handle was dropped");
    }

    #[tokio::test]
    async fn test_subscribe_fails_when_remote_unavailable() {
        let (_store, remote, listener) = setup();
        remote.set_unavailable("offline");

        let err = listener.subscribe().await.unwrap_err();
        assert!(err.is_remote_error());
    }
}
