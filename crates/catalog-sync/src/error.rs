//! # Sync Error Types
//!
//! Error types for cache synchronization and the public catalog API.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Remote      │  │       Storage           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  RemoteFetch    │  │  Storage(DbError)       │ │
//! │  │  ConfigLoad     │  │   Unavailable   │  │   cache left in last    │ │
//! │  │  ConfigSave     │  │   Rejected      │  │   known-good state      │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error here is `Clone` so one failed in-flight reload can be handed
//! to every caller that joined it.

use thiserror::Error;

use catalog_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Remote Fetch Error
// =============================================================================

/// Failure reported by a remote source adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteFetchError {
    /// Network or service failure; a later attempt may succeed.
    #[error("Remote source unavailable: {0}")]
    Unavailable(String),

    /// The remote refused the request (permissions, bad filter).
    #[error("Remote source rejected request: {0}")]
    Rejected(String),

    /// The remote returned a document that is not a product record.
    #[error("Remote document {id} could not be read: {reason}")]
    MalformedDocument { id: String, reason: String },
}

impl RemoteFetchError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        RemoteFetchError::Unavailable(reason.into())
    }
}

// =============================================================================
// Sync Error
// =============================================================================

/// Sync error type covering every failure the catalog API can return.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid catalog configuration.
    #[error("Invalid catalog configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// Remote fetch failed. The cache and `lastSyncTime` are untouched.
    #[error(transparent)]
    RemoteFetch(#[from] RemoteFetchError),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Local cache store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}
// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if retrying the same operation later may succeed.
    ///
    /// ## Retryable Errors
    /// - Remote unavailable (network issues)
    /// - Pool exhaustion or a lost connection to the local store
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Rejected remote requests
    /// - Corrupted or full storage
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteFetch(RemoteFetchError::Unavailable(_))
                | SyncError::Storage(DbError::PoolExhausted)
                | SyncError::Storage(DbError::ConnectionFailed(_))
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the remote side failed.
    pub fn is_remote_error(&self) -> bool {
        matches!(self, SyncError::RemoteFetch(_))
    }

    /// Returns true if the local store failed.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, SyncError::Storage(_))
    }
}
