//! Limiter trait for abstracting over admission backends.

use std::sync::Arc;
use std::time::Duration;

/// Trait for sliding window limiter implementations.
///
/// Collaborators such as the traffic simulation are written against this
/// trait rather than a concrete limiter. All operations are total: any key
/// is valid and none of them fail.
pub trait LimiterBackend: Send + Sync {
    /// Whether an event for `key` would be admitted now. Records nothing.
    fn is_allowed(&self, key: &str) -> bool;

    /// Admit and record an event for `key` if there is room.
    fn try_admit(&self, key: &str) -> bool;

    /// How long until an event for `key` would be admitted. Zero if now.
    fn time_until_next_admission(&self, key: &str) -> Duration;
}

impl<L: LimiterBackend + ?Sized> LimiterBackend for Arc<L> {
    fn is_allowed(&self, key: &str) -> bool {
        (**self).is_allowed(key)
    }

    fn try_admit(&self, key: &str) -> bool {
        (**self).try_admit(key)
    }

    fn time_until_next_admission(&self, key: &str) -> Duration {
        (**self).time_until_next_admission(key)
    }
}
