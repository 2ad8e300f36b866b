//! Storage error types.

use thiserror::Error;

/// Result type for watch store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in a watch store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// A stored row could not be mapped back to a domain type
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}
