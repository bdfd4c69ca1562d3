//! # Error Types
//!
//! Domain-specific error types for catalog-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  catalog-core errors (this file)                                       │
//! │  └── ValidationError  - Write-path validation failures                 │
//! │                                                                         │
//! │  catalog-db errors (separate crate)                                    │
//! │  └── DbError          - Local cache store failures (StorageError)      │
//! │                                                                         │
//! │  catalog-sync errors (separate crate)                                  │
//! │  └── SyncError        - Remote fetch, storage, config failures         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `ValidationError` is only ever raised by the write path that produces
//! records. The cache stores whatever it is handed.

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors raised by the record write path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// A list has no non-empty entry.
    #[error("{field} must contain at least one non-empty entry")]
    NoEntries { field: String },

    /// Fields that must be set together are inconsistent.
    #[error("{field} is inconsistent: {reason}")]
    Inconsistent { field: String, reason: String },
}

// =============================================================================
// Unit Tests
// =============================================================================
