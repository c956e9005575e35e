//! Capacity limits, FIFO eviction, and near-full warnings.

use outbox_store::{queue_size_bytes, MessageStatus, QueuedMessage};
use tracing::warn;

/// Maximum number of queued messages.
pub const MAX_MESSAGE_COUNT: usize = 100;

/// Maximum serialized queue size in bytes.
pub const MAX_QUEUE_BYTES: usize = 50_000_000;

/// Percentage of either limit at which a near-full warning fires.
pub const WARNING_THRESHOLD_PERCENT: u8 = 80;

/// A near-full capacity warning.
///
/// Both percentages are clamped to 100. The absence of a warning is
/// represented as `None` at the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearFull {
    /// Percent of the message-count limit in use.
    pub message_percent: u8,
    /// Percent of the byte limit in use.
    pub size_percent: u8,
}

/// A listener notified when the capacity warning changes.
///
/// Notifications fire only on a change of value, not on every check,
/// so a queue that stays near-full does not spam its subscribers.
pub trait CapacityListener: Send + Sync {
    /// Called with the new warning value (`None` when the queue dropped
    /// back below the threshold).
    fn on_capacity_change(&self, warning: Option<NearFull>);
}

/// A listener that records every notification, for testing.
#[derive(Debug, Default)]
pub struct RecordingListener {
    notifications: std::sync::Mutex<Vec<Option<NearFull>>>,
}

impl RecordingListener {
    /// Creates a new recording listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded notifications in order.
    pub fn notifications(&self) -> Vec<Option<NearFull>> {
        self.notifications.lock().expect("lock poisoned").clone()
    }

    /// Returns the number of recorded notifications.
    pub fn len(&self) -> usize {
        self.notifications.lock().expect("lock poisoned").len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CapacityListener for RecordingListener {
    fn on_capacity_change(&self, warning: Option<NearFull>) {
        self.notifications
            .lock()
            .expect("lock poisoned")
            .push(warning);
    }
}

/// Evict messages until both capacity bounds hold.
///
/// The oldest non-failed message goes first; failed messages are
/// evicted only when no healthy message remains. Returns the number of
/// evicted messages.
pub fn enforce_limits(messages: &mut Vec<QueuedMessage>) -> usize {
    let mut evicted = 0;

    while messages.len() > MAX_MESSAGE_COUNT || queue_size_bytes(messages) > MAX_QUEUE_BYTES {
        let victim = oldest_index(messages, false).or_else(|| oldest_index(messages, true));
        let Some(index) = victim else {
            break;
        };

        let removed = messages.remove(index);
        warn!(
            message_id = %removed.id,
            status = ?removed.status,
            "Evicted message over capacity"
        );
        evicted += 1;
    }

    evicted
}

/// Index of the timestamp-oldest message whose failed-ness matches.
fn oldest_index(messages: &[QueuedMessage], failed: bool) -> Option<usize> {
    messages
        .iter()
        .enumerate()
        .filter(|(_, m)| (m.status == MessageStatus::Failed) == failed)
        .min_by_key(|(_, m)| m.timestamp)
        .map(|(index, _)| index)
}

/// Compute the current capacity warning, if any.
pub fn check_warning(count: usize, bytes: usize) -> Option<NearFull> {
    let message_percent = percent_of(count, MAX_MESSAGE_COUNT);
    let size_percent = percent_of(bytes, MAX_QUEUE_BYTES);

    if message_percent >= WARNING_THRESHOLD_PERCENT || size_percent >= WARNING_THRESHOLD_PERCENT {
        Some(NearFull {
            message_percent,
            size_percent,
        })
    } else {
        None
    }
}

fn percent_of(value: usize, max: usize) -> u8 {
    ((value as u64 * 100) / (max as u64)).min(100) as u8
}
