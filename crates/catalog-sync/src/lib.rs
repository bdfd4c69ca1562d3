//! # catalog-sync: Sync Engine for the Catalog Cache
//!
//! Keeps a locally persisted copy of the remote product collection fresh
//! and answers catalog searches from it without a network round-trip.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Catalog Sync Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    ProductCatalog (public API)                   │  │
//! │  │                                                                  │  │
//! │  │  search · search_cached · clear_cache · is_cache_valid          │  │
//! │  │  subscribe_to_live_updates · sync_now                           │  │
//! │  └───────────────┬──────────────────────────────┬───────────────────┘  │
//! │                  │                              │                       │
//! │                  ▼                              ▼                       │
//! │  ┌────────────────────────────┐   ┌────────────────────────────┐       │
//! │  │      SyncCoordinator       │   │       LiveListener         │       │
//! │  │                            │   │                            │       │
//! │  │ fresh / delta / full from  │   │ standing subscription,     │       │
//! │  │ lastUpdated + lastSyncTime │   │ batches → put_all          │       │
//! │  │ single-flight per kind     │   │ Unsubscribe handle         │       │
//! │  └──────────┬─────────────────┘   └──────────┬─────────────────┘       │
//! │             │                                │                          │
//! │             ▼                                ▼                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  RemoteSource (remote document store)  │  ProductCacheStore      │   │
//! │  │  fetch_all, fetch_modified_since,      │  (catalog-db, SQLite)   │   │
//! │  │  subscribe                             │                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`catalog`] - `ProductCatalog`, the public API
//! - [`coordinator`] - Freshness policy and reloads
//! - [`listener`] - Live invalidation listener
//! - [`remote`] - Remote source adapter trait and in-memory adapter
//! - [`config`] - TOML and environment configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use catalog_sync::{CatalogConfig, ProductCatalog, SearchCriteria};
//!
//! let config = CatalogConfig::load(None)?;
//! let catalog = ProductCatalog::open(&config, remote).await?;
//!
//! let results = match catalog.search(&criteria).await {
//!     Ok(results) => results,
//!     Err(e) if e.is_remote_error() => catalog.search_cached(&criteria).await?,
//!     Err(e) => return Err(e),
//! };
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod listener;
pub mod remote;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::ProductCatalog;
pub use config::{CacheSettings, CatalogConfig, SyncSettings};
pub use coordinator::{
    FreshnessPolicy, SyncCoordinator, SyncDecision, SyncKind, SyncOptions, SyncOutcome,
};
pub use error::{RemoteFetchError, SyncError, SyncResult};
pub use listener::{LiveListener, Unsubscribe};
pub use remote::{ChangeFeed, InMemoryRemote, RemoteResult, RemoteSource};

pub use catalog_core::{ProductRecord, SearchCriteria};
pub use catalog_db::StorageError;
