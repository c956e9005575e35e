//! Outbox error types.

use thiserror::Error;

/// Outbox error type.
///
/// Public queue operations never surface these to callers; disk
/// failures are logged and swallowed, transport failures are recorded
/// on the affected message. The type exists for sender implementations
/// and internal plumbing.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] outbox_store::StoreError),

    /// Transport-level send failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;
