//! Core sliding window rate limiter implementation.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::config::LimiterConfig;
use crate::error::Result;

use super::backend::LimiterBackend;
use super::clock::{Clock, SystemClock};
use super::history::EventHistory;

/// Per-key sliding window rate limiter.
///
/// Each key may have at most `max_requests` admitted events inside any
/// trailing window of length `window_size`. Expired events are dropped
/// lazily: every call prunes the history of the key it touches, and a key
/// whose history empties is removed from the map, so inactive keys hold no
/// memory.
///
/// History is sharded per key. The prune, check and append steps of
/// [`try_admit`](Self::try_admit) run under the key's entry lock, so
/// concurrent callers can never overfill a key.
///
/// The clock must be monotonic per key. A clock that goes backwards will
/// not panic but may produce wrong wait times.
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    window_size: Duration,
    max_requests: u64,
    history: DashMap<String, EventHistory>,
    clock: C,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Create a limiter driven by the system monotonic clock.
    ///
    /// A `max_requests` of zero rejects everything; a zero `window_size`
    /// expires every event immediately. Neither is an error.
    pub fn new(window_size: Duration, max_requests: u64) -> Self {
        Self::with_clock(window_size, max_requests, SystemClock)
    }

    /// Create a limiter from raw configuration values.
    pub fn from_config(config: &LimiterConfig) -> Result<Self> {
        Self::from_config_with_clock(config, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    /// Create a limiter reading time from `clock`.
    pub fn with_clock(window_size: Duration, max_requests: u64, clock: C) -> Self {
        debug!(
            window_size = ?window_size,
            max_requests = max_requests,
            "Creating sliding window limiter"
        );
        Self {
            window_size,
            max_requests,
            history: DashMap::new(),
            clock,
        }
    }

    /// Create a limiter from raw configuration values, reading time from `clock`.
    pub fn from_config_with_clock(config: &LimiterConfig, clock: C) -> Result<Self> {
        let window_size = config.window_size()?;
        Ok(Self::with_clock(window_size, config.max_requests, clock))
    }

    /// Length of the trailing window.
    pub fn window_size(&self) -> Duration {
        self.window_size
    }

    /// Maximum admitted events per key within one window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Check whether an event for `key` would be admitted now, without recording it.
    pub fn is_allowed(&self, key: &str) -> bool {
        let now = self.clock.now();
        let allowed = self.with_pruned(key, now, |history| match history {
            Some(history) => history.has_capacity(self.max_requests),
            None => self.max_requests > 0,
        });

        trace!(key = %key, allowed = allowed, "Checked admission");
        allowed
    }

    /// Admit and record an event for `key` if the window has room.
    ///
    /// Returns `false` without touching state when the key is saturated.
    pub fn try_admit(&self, key: &str) -> bool {
        match self.history.entry(key.to_owned()) {
            Entry::Occupied(mut entry) => {
                // Read under the entry lock so records for a key stay ordered.
                let now = self.clock.now();
                let history = entry.get_mut();
                history.prune(now, self.window_size);

                if history.has_capacity(self.max_requests) {
                    history.record(now);
                    trace!(key = %key, count = history.len(), "Admitted event");
                    return true;
                }

                debug!(
                    key = %key,
                    count = history.len(),
                    max_requests = self.max_requests,
                    "Rate limit exceeded"
                );
                if history.is_empty() {
                    entry.remove();
                }
                false
            }
            Entry::Vacant(entry) => {
                if self.max_requests == 0 {
                    debug!(key = %key, "Rate limit exceeded, limiter admits nothing");
                    return false;
                }
                let now = self.clock.now();
                let mut history = EventHistory::new();
                history.record(now);
                entry.insert(history);
                trace!(key = %key, count = 1, "Admitted event");
                true
            }
        }
    }

    /// How long a caller must wait before an event for `key` would be admitted.
    ///
    /// Zero when there is room now. Otherwise the remaining lifetime of the
    /// oldest event that has to leave the window to free a slot.
    pub fn time_until_next_admission(&self, key: &str) -> Duration {
        let now = self.clock.now();
        self.with_pruned(key, now, |history| match history {
            Some(history) => history.wait_time(now, self.window_size, self.max_requests),
            None => Duration::ZERO,
        })
    }

    /// Number of events currently counted against `key`.
    pub fn in_window(&self, key: &str) -> usize {
        let now = self.clock.now();
        self.with_pruned(key, now, |history| history.map_or(0, EventHistory::len))
    }

    /// Number of keys currently holding history.
    ///
    /// Keys are reclaimed lazily, so this only shrinks once an expired key is
    /// touched again.
    pub fn tracked_keys(&self) -> usize {
        self.history.len()
    }

    /// Forget all recorded events.
    pub fn clear(&self) {
        self.history.clear();
    }

    /// Prune `key` at `now`, reclaim it if it emptied, then inspect what is left.
    fn with_pruned<T>(
        &self,
        key: &str,
        now: Instant,
        inspect: impl FnOnce(Option<&EventHistory>) -> T,
    ) -> T {
        let Some(mut history) = self.history.get_mut(key) else {
            return inspect(None);
        };

        history.prune(now, self.window_size);
        if !history.is_empty() {
            return inspect(Some(&*history));
        }

        drop(history);
        // Re-checked under the shard lock in case another caller admitted in between.
        if self.history.remove_if(key, |_, h| h.is_empty()).is_some() {
            debug!(key = %key, "Reclaimed idle key");
            return inspect(None);
        }
        let current = self.history.get(key);
        inspect(current.as_deref())
    }
}

impl<C: Clock> LimiterBackend for SlidingWindowLimiter<C> {
    fn is_allowed(&self, key: &str) -> bool {
        Self::is_allowed(self, key)
    }

    fn try_admit(&self, key: &str) -> bool {
        Self::try_admit(self, key)
    }

    fn time_until_next_admission(&self, key: &str) -> Duration {
        Self::time_until_next_admission(self, key)
    }
}
