//! # catalog-core: Pure Types and Search Rules for the Catalog Cache
//!
//! This crate holds everything about the product catalog that can be
//! expressed without touching a disk or a network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Catalog Cache Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Admin UI (catalog search screen)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ search(criteria)                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          catalog-sync (coordinator, listener, catalog)          │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼──────────────┐   ┌───────────────▼───────────────┐   │
//! │  │ catalog-db (SQLite cache)   │   │ Remote document store         │   │
//! │  └──────────────┬──────────────┘   └───────────────────────────────┘   │
//! │                 │                                                       │
//! │  ┌──────────────▼──────────────────────────────────────────────────┐   │
//! │  │               ★ catalog-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌──────────┐  │   │
//! │  │   │   types   │  │  search   │  │ validation │  │  clock   │  │   │
//! │  │   │  Product  │  │ Criteria  │  │ write-path │  │ System / │  │   │
//! │  │   │  Record   │  │ ordering  │  │   checks   │  │  Manual  │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ProductRecord, Location, AuditTrail, ...)
//! - [`search`] - Search criteria, filtering and name ordering
//! - [`validation`] - Write-path validation (never applied to cache writes)
//! - [`clock`] - Time source used for freshness decisions
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use catalog_core::search::SearchCriteria;
//!
//! let criteria = SearchCriteria::new()
//!     .term("maple")
//!     .category("Food");
//!
//! assert!(!criteria.is_empty());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod error;
pub mod search;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ValidationError;
pub use search::SearchCriteria;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Country assigned to a location that arrives without one.
///
/// Deployments override this through `[cache] default_country`.
pub const DEFAULT_COUNTRY: &str = "Canada";

/// Maximum length of a free-text search term.
pub const MAX_SEARCH_TERM_LEN: usize = 100;

/// Maximum length of a brand name.
pub const MAX_NAME_LEN: usize = 200;
