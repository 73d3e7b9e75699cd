//! Rate limiting of anchor update batches.

use std::time::{Duration, Instant};

/// Default minimum spacing between processed batches (≈12 Hz).
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(83);

/// Drops batches that arrive sooner than `min_interval` after the last
/// accepted one.
///
/// The throttle is keyed on whole batches, not anchors: when a batch is
/// dropped every anchor in it waits for the sensor's next update. Removals
/// bypass the throttle entirely.
#[derive(Debug, Clone)]
pub struct UpdateThrottle {
    min_interval: Duration,
    last_accepted: Option<Instant>,
    accepted: u64,
    dropped: u64,
}

impl UpdateThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
            accepted: 0,
            dropped: 0,
        }
    }

    /// Decide whether a batch stamped `at` is processed.
    ///
    /// Stamps older than the last accepted one count as too soon.
    pub fn try_accept(&mut self, at: Instant) -> bool {
        let due = match self.last_accepted {
            None => true,
            Some(last) => at.saturating_duration_since(last) >= self.min_interval,
        };
        if due {
            self.last_accepted = Some(at);
            self.accepted += 1;
        } else {
            self.dropped += 1;
        }
        due
    }

    /// Forget the last accepted batch and the counters.
    pub fn reset(&mut self) {
        self.last_accepted = None;
        self.accepted = 0;
        self.dropped = 0;
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for UpdateThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
