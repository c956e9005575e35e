//! Queue facade and sync engine.
//!
//! `OfflineQueue` is the single owner of the in-memory collection and
//! the persisted file: every mutating operation goes through one
//! `tokio::sync::Mutex`, so no two mutations interleave. Sender I/O is
//! performed without holding that lock, which lets enqueues land
//! between send attempts of a running pass without ever observing a
//! half-applied transition.

use crate::capacity::{self, CapacityListener, NearFull};
use crate::retry;
use crate::sender::{SendOutcome, SenderFn};
use chrono::Utc;
use outbox_store::{queue_size_bytes, Attachment, MessageStatus, QueueStore, QueuedMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Summary of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncResult {
    /// Messages accepted by the remote and removed.
    pub sent: usize,
    /// Send attempts that came back as errors during this pass.
    pub failed: usize,
    /// Messages the remote reported as duplicates, removed silently.
    pub duplicates_removed: usize,
    /// Messages still queued after the pass.
    pub remaining: usize,
}

/// Observable queue state for a consumer/UI layer.
///
/// Snapshots are refreshed at operation boundaries (after an enqueue,
/// removal, or completed sync pass), never mid-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Number of queued messages.
    pub message_count: usize,
    /// Serialized size of the queue in bytes.
    pub queue_size_bytes: usize,
    /// Number of messages in failed status.
    pub failed_message_count: usize,
    /// Whether a sync pass is currently running.
    pub is_syncing: bool,
    /// Current capacity warning, if the queue is near a limit.
    pub capacity_warning: Option<NearFull>,
    /// Summary of the most recent sync pass.
    pub last_sync_result: Option<SyncResult>,
}

/// Mutable queue state, guarded by the facade's mutex.
struct Inner {
    messages: Vec<QueuedMessage>,
    store: QueueStore,
    capacity_warning: Option<NearFull>,
    last_sync_result: Option<SyncResult>,
}

/// Persistent offline delivery queue.
pub struct OfflineQueue {
    inner: Mutex<Inner>,
    stats: std::sync::RwLock<QueueStats>,
    listeners: std::sync::RwLock<Vec<Arc<dyn CapacityListener>>>,
    is_syncing: AtomicBool,
}

impl OfflineQueue {
    /// Open a queue backed by the given store.
    ///
    /// Loads the persisted collection and normalizes any `sending`
    /// status back to `pending`: a persisted in-flight attempt cannot
    /// represent an owned, running send after a restart.
    pub fn open(store: QueueStore) -> Self {
        let mut messages = store.load();

        let mut normalized = 0;
        for message in &mut messages {
            if message.status == MessageStatus::Sending {
                message.status = MessageStatus::Pending;
                normalized += 1;
            }
        }
        if normalized > 0 {
            info!(count = normalized, "Normalized in-flight messages back to pending");
            if let Err(e) = store.save(&messages) {
                warn!(error = %e, "Failed to persist normalized queue");
            }
        }

        let capacity_warning = capacity::check_warning(messages.len(), queue_size_bytes(&messages));
        let inner = Inner {
            messages,
            store,
            capacity_warning,
            last_sync_result: None,
        };

        let queue = Self {
            stats: std::sync::RwLock::new(QueueStats::default()),
            listeners: std::sync::RwLock::new(Vec::new()),
            is_syncing: AtomicBool::new(false),
            inner: Mutex::new(inner),
        };
        {
            let inner = queue.inner.try_lock().expect("queue lock free at open");
            queue.refresh_stats(&inner);
        }
        queue
    }

    /// Register a capacity warning listener.
    pub fn add_capacity_listener(&self, listener: Arc<dyn CapacityListener>) {
        self.listeners
            .write()
            .expect("lock poisoned")
            .push(listener);
    }

    /// Enqueue a new message; returns its ID for correlation.
    pub async fn enqueue(
        &self,
        content: impl Into<String>,
        attachments: Option<Vec<Attachment>>,
        thinking: Option<String>,
    ) -> String {
        let message = QueuedMessage::new(content, attachments, thinking);
        let id = message.id.clone();

        let mut inner = self.inner.lock().await;
        inner.messages.push(message);
        capacity::enforce_limits(&mut inner.messages);
        self.update_warning(&mut inner);
        Self::persist(&inner);
        self.refresh_stats(&inner);

        debug!(message_id = %id, count = inner.messages.len(), "Enqueued message");
        id
    }

    /// Drain all eligible messages through the sender.
    ///
    /// Mutually exclusive with itself: a concurrent call returns
    /// immediately with an all-zero result and the current remaining
    /// count. The pass works over a snapshot of eligible IDs, so
    /// messages enqueued after it starts are left for the next pass.
    /// Persistence happens once, after the pass fully resolves.
    pub async fn sync_all(&self, sender: &SenderFn) -> SyncResult {
        if self.is_syncing.swap(true, Ordering::SeqCst) {
            let inner = self.inner.lock().await;
            debug!("Sync pass already running, skipping");
            return SyncResult {
                remaining: inner.messages.len(),
                ..SyncResult::default()
            };
        }

        let now = Utc::now();
        let eligible: Vec<String> = {
            let inner = self.inner.lock().await;
            inner
                .messages
                .iter()
                .filter(|m| retry::is_eligible(m, now))
                .map(|m| m.id.clone())
                .collect()
        };
        debug!(eligible = eligible.len(), "Starting sync pass");

        let mut sent = 0;
        let mut failed = 0;
        let mut duplicates_removed = 0;

        for id in eligible {
            let attempt = {
                let mut inner = self.inner.lock().await;
                match inner.messages.iter_mut().find(|m| m.id == id) {
                    Some(message) => {
                        message.status = MessageStatus::Sending;
                        message.last_retry_at = Some(Utc::now());
                        Some(message.clone())
                    }
                    // Removed or evicted since the snapshot.
                    None => None,
                }
            };
            let Some(message) = attempt else {
                continue;
            };

            let outcome = match sender(message).await {
                Ok(outcome) => outcome,
                Err(e) => SendOutcome::Error {
                    reason: e.to_string(),
                },
            };

            let mut inner = self.inner.lock().await;
            let Some(index) = inner.messages.iter().position(|m| m.id == id) else {
                // Removed while in flight; the outcome is dropped.
                continue;
            };

            match outcome {
                SendOutcome::Success { correlation_id } => {
                    inner.messages.remove(index);
                    sent += 1;
                    debug!(
                        message_id = %id,
                        correlation_id = ?correlation_id,
                        "Message delivered"
                    );
                }
                SendOutcome::Duplicate => {
                    inner.messages.remove(index);
                    duplicates_removed += 1;
                    info!(message_id = %id, "Remote reported duplicate, dropping message");
                }
                SendOutcome::Error { reason } => {
                    failed += 1;
                    let message = &mut inner.messages[index];
                    message.retry_count += 1;
                    message.last_error = Some(reason.clone());
                    if message.retry_count >= retry::MAX_RETRY_ATTEMPTS {
                        message.status = MessageStatus::Failed;
                        warn!(
                            message_id = %id,
                            retry_count = message.retry_count,
                            error = %reason,
                            "Message failed permanently, awaiting manual action"
                        );
                    } else {
                        message.status = MessageStatus::Pending;
                        debug!(
                            message_id = %id,
                            retry_count = message.retry_count,
                            error = %reason,
                            "Send failed, will retry after backoff"
                        );
                    }
                }
            }
        }

        let mut inner = self.inner.lock().await;
        let result = SyncResult {
            sent,
            failed,
            duplicates_removed,
            remaining: inner.messages.len(),
        };
        inner.last_sync_result = Some(result);
        self.update_warning(&mut inner);
        Self::persist(&inner);
        self.is_syncing.store(false, Ordering::SeqCst);
        self.refresh_stats(&inner);

        info!(
            sent,
            failed,
            duplicates = duplicates_removed,
            remaining = result.remaining,
            "Sync pass complete"
        );
        result
    }

    /// Manually retry a failed message with a single immediate attempt,
    /// outside the automatic backoff cycle.
    ///
    /// Returns true if the message was delivered (or discarded as a
    /// duplicate). On failure the message goes straight back to
    /// `failed` with `retry_count = 1`; the 3-strike count does not
    /// apply to manual attempts.
    pub async fn retry_message(&self, id: &str, sender: &SenderFn) -> bool {
        let attempt = {
            let mut inner = self.inner.lock().await;
            match inner
                .messages
                .iter_mut()
                .find(|m| m.id == id && m.status == MessageStatus::Failed)
            {
                Some(message) => {
                    message.retry_count = 0;
                    message.last_error = None;
                    message.status = MessageStatus::Sending;
                    message.last_retry_at = Some(Utc::now());
                    Some(message.clone())
                }
                None => None,
            }
        };
        let Some(message) = attempt else {
            debug!(message_id = %id, "Manual retry ignored (no failed message with this ID)");
            return false;
        };

        let outcome = match sender(message).await {
            Ok(outcome) => outcome,
            Err(e) => SendOutcome::Error {
                reason: e.to_string(),
            },
        };

        let mut inner = self.inner.lock().await;
        let Some(index) = inner.messages.iter().position(|m| m.id == id) else {
            return false;
        };

        let delivered = match outcome {
            SendOutcome::Success { .. } | SendOutcome::Duplicate => {
                inner.messages.remove(index);
                info!(message_id = %id, "Manual retry delivered message");
                true
            }
            SendOutcome::Error { reason } => {
                let message = &mut inner.messages[index];
                message.status = MessageStatus::Failed;
                message.retry_count = 1;
                message.last_error = Some(reason.clone());
                warn!(message_id = %id, error = %reason, "Manual retry failed");
                false
            }
        };

        self.update_warning(&mut inner);
        Self::persist(&inner);
        self.refresh_stats(&inner);
        delivered
    }

    /// Remove a message unconditionally, regardless of status.
    pub async fn remove_message(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(index) = inner.messages.iter().position(|m| m.id == id) else {
            return false;
        };

        inner.messages.remove(index);
        self.update_warning(&mut inner);
        Self::persist(&inner);
        self.refresh_stats(&inner);

        debug!(message_id = %id, "Removed message");
        true
    }

    /// Remove every queued message.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        let count = inner.messages.len();
        inner.messages.clear();
        self.update_warning(&mut inner);
        Self::persist(&inner);
        self.refresh_stats(&inner);

        info!(count, "Cleared queue");
    }

    /// Snapshot of the observable counters.
    pub fn stats(&self) -> QueueStats {
        let mut stats = *self.stats.read().expect("lock poisoned");
        stats.is_syncing = self.is_syncing.load(Ordering::SeqCst);
        stats
    }

    /// Whether a sync pass is currently running.
    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::SeqCst)
    }

    /// Number of queued messages.
    pub async fn message_count(&self) -> usize {
        self.inner.lock().await.messages.len()
    }

    /// Messages currently in failed status, for manual retry/removal.
    pub async fn failed_messages(&self) -> Vec<QueuedMessage> {
        self.inner
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.status == MessageStatus::Failed)
            .cloned()
            .collect()
    }

    /// Persist the collection; failures are logged and swallowed, the
    /// in-memory collection stays authoritative until the next save.
    fn persist(inner: &Inner) {
        if let Err(e) = inner.store.save(&inner.messages) {
            warn!(error = %e, "Failed to persist queue, continuing in memory");
        }
    }

    /// Recompute the capacity warning and notify listeners on change.
    fn update_warning(&self, inner: &mut Inner) {
        let warning =
            capacity::check_warning(inner.messages.len(), queue_size_bytes(&inner.messages));
        if warning == inner.capacity_warning {
            return;
        }

        inner.capacity_warning = warning;
        let listeners: Vec<_> = self.listeners.read().expect("lock poisoned").clone();
        for listener in listeners {
            listener.on_capacity_change(warning);
        }
    }

    /// Refresh the cached observable snapshot.
    fn refresh_stats(&self, inner: &Inner) {
        let stats = QueueStats {
            message_count: inner.messages.len(),
            queue_size_bytes: queue_size_bytes(&inner.messages),
            failed_message_count: inner
                .messages
                .iter()
                .filter(|m| m.status == MessageStatus::Failed)
                .count(),
            is_syncing: self.is_syncing.load(Ordering::SeqCst),
            capacity_warning: inner.capacity_warning,
            last_sync_result: inner.last_sync_result,
        };
        *self.stats.write().expect("lock poisoned") = stats;
    }
}
