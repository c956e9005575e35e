//! Retry scheduling: exponential backoff and cooldown eligibility.

use chrono::{DateTime, Duration, Utc};
use outbox_store::{MessageStatus, QueuedMessage};

/// Base delay before the first retry, in seconds.
pub const BASE_RETRY_DELAY_SECS: i64 = 1;

/// Automatic attempts before a message is marked failed.
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Exponent cap; backoff never exceeds `base * 2^4` (16s).
const BACKOFF_EXPONENT_CAP: u32 = 4;

/// Computes the backoff duration for a given retry count.
///
/// Implements binary exponential backoff:
/// `delay = base * 2^min(retry_count, 4)`
///
/// | Retry Count | Delay |
/// |-------------|-------|
/// | 0           | 1s    |
/// | 1           | 2s    |
/// | 2           | 4s    |
/// | 3           | 8s    |
/// | 4+          | 16s (capped) |
pub fn backoff(retry_count: u32) -> Duration {
    Duration::seconds(BASE_RETRY_DELAY_SECS << retry_count.min(BACKOFF_EXPONENT_CAP))
}

/// Whether a message is a candidate for the next sync pass.
///
/// Failed messages are excluded (manual retry only); everything else
/// is eligible once its backoff cooldown has elapsed, or immediately
/// if it has never been attempted.
pub fn is_eligible(message: &QueuedMessage, now: DateTime<Utc>) -> bool {
    if message.status == MessageStatus::Failed {
        return false;
    }

    let Some(last_retry_at) = message.last_retry_at else {
        return true;
    };

    now >= last_retry_at + backoff(message.retry_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_table() {
        assert_eq!(backoff(0), Duration::seconds(1));
        assert_eq!(backoff(1), Duration::seconds(2));
        assert_eq!(backoff(2), Duration::seconds(4));
        assert_eq!(backoff(3), Duration::seconds(8));
        assert_eq!(backoff(4), Duration::seconds(16));
    }

    #[test]
    fn test_backoff_caps_at_sixteen_seconds() {
        assert_eq!(backoff(5), Duration::seconds(16));
        assert_eq!(backoff(100), Duration::seconds(16));
    }

    #[test]
    fn test_never_attempted_message_is_eligible() {
        let msg = QueuedMessage::new("hello", None, None);
        assert!(is_eligible(&msg, Utc::now()));
    }

    #[test]
    fn test_failed_message_is_never_eligible() {
        let mut msg = QueuedMessage::new("hello", None, None);
        msg.status = MessageStatus::Failed;
        msg.last_retry_at = None;

        assert!(!is_eligible(&msg, Utc::now() + Duration::days(1)));
    }

    #[test]
    fn test_eligibility_respects_cooldown() {
        let now = Utc::now();
        let mut msg = QueuedMessage::new("hello", None, None);
        msg.retry_count = 1;
        msg.last_retry_at = Some(now);

        // backoff(1) = 2s
        assert!(!is_eligible(&msg, now));
        assert!(!is_eligible(&msg, now + Duration::seconds(1)));
        assert!(is_eligible(&msg, now + Duration::seconds(2)));
        assert!(is_eligible(&msg, now + Duration::seconds(30)));
    }

    #[test]
    fn test_eligibility_uses_capped_backoff() {
        let now = Utc::now();
        let mut msg = QueuedMessage::new("hello", None, None);
        msg.retry_count = 10;
        msg.last_retry_at = Some(now);

        assert!(!is_eligible(&msg, now + Duration::seconds(15)));
        assert!(is_eligible(&msg, now + Duration::seconds(16)));
    }
}
