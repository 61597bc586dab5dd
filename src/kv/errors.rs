//! Key-value store error types

use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KvError {
    /// Failed to reach the store backend
    #[error("Store connection error: {0}")]
    ConnectionError(String),

    /// Store operation timed out
    #[error("Store operation timed out: {0}")]
    Timeout(String),

    /// Generic backend error
    #[error("Store backend error: {0}")]
    BackendError(String),
}

/// Result type for store operations
pub type KvResult<T> = Result<T, KvError>;
