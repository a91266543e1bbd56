//! Per-endpoint failure backoff.
//!
//! A recently-failed endpoint is skipped without a network call until its
//! window expires. The window doubles with every consecutive failure up to
//! a cap, so a dead upstream costs one probe per window instead of one per
//! page render. State is in-memory only and scoped to one client instance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One endpoint's failure state.
#[derive(Debug, Clone, Copy)]
struct BackoffEntry {
    failed_at: Instant,
    consecutive: u32,
}

/// Failure tracker with exponentially growing skip windows.
#[derive(Debug)]
pub struct FailureBackoff {
    entries: HashMap<i64, BackoffEntry>,
    initial: Duration,
    max: Duration,
}

impl FailureBackoff {
    /// Create a tracker with the given initial window and cap.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            initial,
            max,
        }
    }

    /// Window length after the given number of consecutive failures.
    fn window(&self, consecutive: u32) -> Duration {
        let doublings = consecutive.saturating_sub(1).min(31);
        self.initial
            .saturating_mul(2u32.saturating_pow(doublings))
            .min(self.max)
    }

    /// Time left in the endpoint's current window, if it is still closed.
    pub fn remaining(&self, endpoint_id: i64) -> Option<Duration> {
        let entry = self.entries.get(&endpoint_id)?;
        self.window(entry.consecutive)
            .checked_sub(entry.failed_at.elapsed())
            .filter(|left| !left.is_zero())
    }

    /// Whether the endpoint should be skipped without a network call.
    pub fn is_suppressed(&self, endpoint_id: i64) -> bool {
        self.remaining(endpoint_id).is_some()
    }

    /// Record a failed attempt. Returns the new consecutive failure count.
    pub fn record_failure(&mut self, endpoint_id: i64) -> u32 {
        let entry = self.entries.entry(endpoint_id).or_insert(BackoffEntry {
            failed_at: Instant::now(),
            consecutive: 0,
        });
        entry.consecutive += 1;
        entry.failed_at = Instant::now();
        entry.consecutive
    }

    /// Forget the endpoint's failure state after a success.
    pub fn clear(&mut self, endpoint_id: i64) {
        self.entries.remove(&endpoint_id);
    }

    /// Consecutive failure count for an endpoint (0 when untracked).
    pub fn consecutive_failures(&self, endpoint_id: i64) -> u32 {
        self.entries.get(&endpoint_id).map_or(0, |e| e.consecutive)
    }
}
