//! Persistent, bounded, idempotent offline delivery queue.
//!
//! Buffers outbound messages while the remote transport is unreachable
//! and drains them once connectivity returns, with retry-with-backoff,
//! duplicate detection, and capacity-bounded FIFO eviction.
//!
//! This crate provides:
//! - OfflineQueue: Facade owning the in-memory collection and the persisted file
//! - SenderFn / SendOutcome: The injected delivery capability and its result
//! - Capacity enforcement with near-full warnings via CapacityListener
//! - A pure retry scheduler (exponential backoff, cooldown eligibility)
//!
//! Delivery is at-least-once: the message `id` is presented to the
//! remote side as an idempotency token, and a `Duplicate` outcome
//! removes the local record without counting it as sent.

mod capacity;
mod error;
mod queue;
mod retry;
mod sender;

pub use capacity::{
    check_warning, enforce_limits, CapacityListener, NearFull, RecordingListener,
    MAX_MESSAGE_COUNT, MAX_QUEUE_BYTES, WARNING_THRESHOLD_PERCENT,
};
pub use error::{OutboxError, OutboxResult};
pub use queue::{OfflineQueue, QueueStats, SyncResult};
pub use retry::{backoff, is_eligible, MAX_RETRY_ATTEMPTS};
pub use sender::{sender_from_fn, SendOutcome, SenderFn};

pub use outbox_store::{queue_size_bytes, Attachment, MessageStatus, QueueStore, QueuedMessage};
