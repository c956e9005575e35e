//! The injected sender capability and its outcome classification.

use crate::OutboxResult;
use outbox_store::QueuedMessage;
use std::future::Future;
use std::pin::Pin;

/// Result of presenting one message to the remote transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The remote accepted the message.
    Success {
        /// Optional remote-side correlation ID.
        correlation_id: Option<String>,
    },
    /// The remote already holds a message with this idempotency token.
    /// The local record is discarded without counting as sent.
    Duplicate,
    /// The transport rejected the message or was unreachable.
    Error {
        /// Human-readable failure reason, recorded on the message.
        reason: String,
    },
}

/// Sender function type injected into the queue.
///
/// A returned `Err` is treated identically to `SendOutcome::Error`.
/// The queue imposes no timeout of its own; bounding latency is the
/// sender's responsibility.
pub type SenderFn = Box<
    dyn Fn(QueuedMessage) -> Pin<Box<dyn Future<Output = OutboxResult<SendOutcome>> + Send>>
        + Send
        + Sync,
>;

/// Build a [`SenderFn`] from an async closure.
pub fn sender_from_fn<F, Fut>(f: F) -> SenderFn
where
    F: Fn(QueuedMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OutboxResult<SendOutcome>> + Send + 'static,
{
    Box::new(move |message| Box::pin(f(message)))
}
