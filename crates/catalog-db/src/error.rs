//! # Database Error Types
//!
//! Error types for local cache storage.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← the cache's StorageError                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError::Storage (catalog-sync)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller of search / ensure_fresh decides how to degrade                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries owned strings so the error is `Clone`: a single
//! in-flight sync can hand the same failure to every waiter.

use thiserror::Error;

/// Local cache storage errors.
#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created or opened
    /// - File permissions issue
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction could not begin or commit. Nothing from it is visible.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// The store is out of space (disk full / quota exceeded).
    #[error("Storage full: {0}")]
    StorageFull(String),

    /// The database file itself is damaged.
    #[error("Storage corrupted: {0}")]
    Corrupted(String),

    /// A cached row could not be decoded back into a record.
    #[error("Cached record {id} is unreadable: {reason}")]
    CorruptRecord { id: String, reason: String },

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// The cache's storage error, under the name callers look for.
pub type StorageError = DbError;

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database "disk is full"     → DbError::StorageFull
/// sqlx::Error::Database "malformed" / ...  → DbError::Corrupted
/// sqlx::Error::Database (other)            → DbError::QueryFailed
/// sqlx::Error::PoolTimedOut                → DbError::PoolExhausted
/// sqlx::Error::PoolClosed                  → DbError::ConnectionFailed
/// Other                                    → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if msg.contains("database or disk is full") {
                    DbError::StorageFull(msg.to_string())
                } else if msg.contains("malformed") || msg.contains("not a database") {
                    DbError::Corrupted(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl DbError {
    /// Creates a CorruptRecord error for a row that failed to decode.
    pub fn corrupt_record(id: impl Into<String>, reason: impl ToString) -> Self {
        DbError::CorruptRecord {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_map() {
        assert!(matches!(
            DbError::from(sqlx::Error::PoolTimedOut),
            DbError::PoolExhausted
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::ConnectionFailed(_)
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::RowNotFound),
            DbError::Internal(_)
        ));
    }

    #[test]
    fn test_corrupt_record_message() {
        let err = DbError::corrupt_record("p-1", "expected value at line 1");
        assert_eq!(
            err.to_string(),
            "Cached record p-1 is unreadable: expected value at line 1"
        );
    }
}
