//! Per-key event history.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Timestamps of admitted events for a single key, oldest first.
///
/// Timestamps are appended at call time, so the sequence stays sorted as
/// long as the clock feeding it is monotonic.
#[derive(Debug, Default, Clone)]
pub struct EventHistory {
    timestamps: VecDeque<Instant>,
}

impl EventHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp that has left the window ending at `now`.
    ///
    /// A timestamp `ts` is expired when `ts <= now - window`. Scanning stops
    /// at the first timestamp still inside the window. Returns how many
    /// timestamps were removed.
    pub fn prune(&mut self, now: Instant, window: Duration) -> usize {
        let before = self.timestamps.len();
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) < window {
                break;
            }
            self.timestamps.pop_front();
        }
        before - self.timestamps.len()
    }

    /// Record an admitted event.
    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    /// Number of events currently held.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether no events are held.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Whether another event fits under `max_requests`.
    pub fn has_capacity(&self, max_requests: u64) -> bool {
        (self.timestamps.len() as u64) < max_requests
    }

    /// The timestamp whose expiry frees the next slot.
    ///
    /// Only defined when the history is saturated (`len >= max_requests`) and
    /// `max_requests > 0`.
    pub fn pivot(&self, max_requests: u64) -> Option<Instant> {
        if max_requests == 0 {
            return None;
        }
        let count = self.timestamps.len() as u64;
        let index = count.checked_sub(max_requests)?;
        self.timestamps.get(index as usize).copied()
    }

    /// Time until a new event would fit, as seen at `now`.
    pub fn wait_time(&self, now: Instant, window: Duration, max_requests: u64) -> Duration {
        if self.has_capacity(max_requests) {
            return Duration::ZERO;
        }
        match self.pivot(max_requests) {
            Some(pivot) => window.saturating_sub(now.saturating_duration_since(pivot)),
            None => Duration::ZERO,
        }
    }
}
