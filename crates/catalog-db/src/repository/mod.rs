//! # Repository Module
//!
//! SQL access for the product cache, kept behind a small API.
//!
//! ```text
//! ProductCacheStore (policy-free Local Cache Store)
//!      │
//!      │  db.product_cache().upsert_all(&records, now)
//!      ▼
//! ProductCacheRepository
//! ├── upsert_all / replace_all   (one transaction each, with metadata)
//! ├── list_all / get_by_id
//! ├── metadata / count
//! └── clear
//!      │
//!      ▼
//! SQLite (product_cache, cache_metadata)
//! ```
//!
//! ## Available Repositories
//!
//! - [`product_cache::ProductCacheRepository`] - Cached records and cache metadata

pub mod product_cache;
