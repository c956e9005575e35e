//! Queued message data model and persisted schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery status of a queued message.
///
/// There is no "sent" status - a successful delivery removes the record.
/// "Duplicate" is likewise a transient sender outcome, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Waiting for the next sync pass (subject to backoff).
    Pending,
    /// A send attempt is currently in flight.
    Sending,
    /// Retries exhausted; only manual retry or removal advances it.
    Failed,
}

/// An opaque attachment blob carried alongside a message.
///
/// The queue does not interpret attachment content; it is base64 text
/// produced and consumed by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Unique attachment ID.
    pub id: String,
    /// MIME type (e.g. "image/png").
    pub mime_type: String,
    /// Original file name.
    pub file_name: String,
    /// Base64-encoded content.
    pub content: String,
}

/// A message buffered for delivery once connectivity returns.
///
/// The `id` doubles as the idempotency token presented to the remote
/// side, so retried deliveries of the same logical message can be
/// deduplicated there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
    /// Unique ID, generated at creation, never reassigned.
    pub id: String,
    /// Creation time; drives FIFO eviction order.
    pub timestamp: DateTime<Utc>,
    /// Message payload (opaque to the queue).
    pub content: String,
    /// Optional ordered attachment list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    /// Automatic send attempts since the last reset.
    pub retry_count: u32,
    /// Time of the most recent send attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<DateTime<Utc>>,
    /// Current delivery status.
    pub status: MessageStatus,
    /// Human-readable reason for the last failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Opaque auxiliary tag passed through to the sender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

impl QueuedMessage {
    /// Create a new pending message with a fresh ID.
    pub fn new(
        content: impl Into<String>,
        attachments: Option<Vec<Attachment>>,
        thinking: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            content: content.into(),
            attachments,
            retry_count: 0,
            last_retry_at: None,
            status: MessageStatus::Pending,
            last_error: None,
            thinking,
        }
    }

    /// Serialized size of this message record in bytes.
    pub fn size_bytes(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

/// Total serialized size of a collection, as counted against the
/// queue's byte capacity.
pub fn queue_size_bytes(messages: &[QueuedMessage]) -> usize {
    messages.iter().map(QueuedMessage::size_bytes).sum()
}
