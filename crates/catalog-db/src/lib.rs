//! # catalog-db: Local Product Cache Store
//!
//! This crate keeps the locally persisted copy of the remote product
//! collection. It uses SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Catalog Cache Data Flow                          │
//! │                                                                         │
//! │  SyncCoordinator / LiveListener / ProductCatalog (catalog-sync)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     catalog-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │ ProductCache  │    │ ProductCache   │    │  Migrations  │ │   │
//! │  │   │ Store         │───►│ Repository     │    │  (embedded)  │ │   │
//! │  │   │ (store.rs)    │    │ (SQL)          │    │              │ │   │
//! │  │   │ lazy init,    │    │ atomic upsert  │    │ 001_product_ │ │   │
//! │  │   │ clock stamps  │    │ + metadata     │    │ cache.sql    │ │   │
//! │  │   └───────┬───────┘    └────────────────┘    └──────────────┘ │   │
//! │  │           │ Database (pool.rs)                                  │   │
//! │  └───────────┼─────────────────────────────────────────────────────┘   │
//! │              ▼                                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              SQLite file (WAL) or in-memory for tests           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - The Local Cache Store contract
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage error types
//! - [`repository`] - SQL for the cache tables
//!
//! ## Usage
//!
//! ```rust,ignore
//! use catalog_db::{DbConfig, ProductCacheStore};
//!
//! let store = ProductCacheStore::new(DbConfig::new("catalog-cache.db"));
//! store.put_all(&records).await?;
//! let meta = store.get_metadata().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, StorageError};
pub use pool::{Database, DbConfig};
pub use repository::product_cache::ProductCacheRepository;
pub use store::ProductCacheStore;
