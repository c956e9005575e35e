//! Durable persistence for the offline delivery queue.
//!
//! This crate provides:
//! - QueuedMessage: The unit of work buffered while the transport is unreachable
//! - QueueStore: Whole-queue JSON persistence with atomic file replacement
//! - StoreError: Persistence error type (logged by callers, never fatal)

mod error;
mod message;
mod store;

pub use error::{StoreError, StoreResult};
pub use message::{queue_size_bytes, Attachment, MessageStatus, QueuedMessage};
pub use store::QueueStore;
