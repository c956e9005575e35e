//! Store error types.

use thiserror::Error;

/// Persistence error type.
#[derive(Error, Debug)]
pub enum StoreError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;
