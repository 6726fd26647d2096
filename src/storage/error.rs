//! Error types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// Metric kind is not gauge or counter
    UnsupportedKind(String),

    /// Value does not parse for its kind
    InvalidValue(String),

    /// No value has ever been written for this key
    NotFound(String),

    /// Transient backend fault (connection dropped, pool exhausted) —
    /// eligible for retry
    Unavailable(String),

    /// Non-retryable backend fault (constraint violation, malformed
    /// statement)
    Permanent(String),

    /// A batched update failed and the whole batch was rolled back
    BatchAborted(String),

    /// I/O error (snapshot file access, etc.)
    Io(std::io::Error),

    /// Snapshot serialization/deserialization error
    Serialization(String),
}

impl StorageError {
    /// Whether the error is worth retrying.
    ///
    /// Deliberately narrow: only connection-level faults qualify.
    /// Retrying data or logic errors would mask bugs.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::UnsupportedKind(kind) => {
                write!(f, "unsupported metric kind: {}", kind)
            }
            StorageError::InvalidValue(msg) => write!(f, "invalid metric value: {}", msg),
            StorageError::NotFound(name) => write!(f, "metric not found: {}", name),
            StorageError::Unavailable(msg) => {
                write!(f, "storage backend unavailable: {}", msg)
            }
            StorageError::Permanent(msg) => write!(f, "storage backend error: {}", msg),
            StorageError::BatchAborted(msg) => {
                write!(f, "batch rolled back: {}", msg)
            }
            StorageError::Io(err) => write!(f, "I/O error: {}", err),
            StorageError::Serialization(msg) => write!(f, "snapshot serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// sqlx error classification (used in sql.rs). Only connection-level
// faults map to `Unavailable`; database-reported errors are permanent.
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::Unavailable(io_err.to_string()),
            sqlx::Error::PoolTimedOut => {
                StorageError::Unavailable("connection pool timed out".to_string())
            }
            sqlx::Error::PoolClosed => {
                StorageError::Unavailable("connection pool closed".to_string())
            }
            sqlx::Error::RowNotFound => StorageError::NotFound("no rows found".to_string()),
            sqlx::Error::Database(db_err) => StorageError::Permanent(db_err.to_string()),
            other => StorageError::Permanent(other.to_string()),
        }
    }
}
