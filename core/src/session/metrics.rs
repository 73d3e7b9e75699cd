//! Session throughput monitoring

use std::time::{Duration, Instant};

use tracing::debug;

/// Counts processed anchor meshes and turns them into a per-second rate
/// once per window.
#[derive(Debug, Clone)]
pub(super) struct SessionMetrics {
    window: Duration,
    window_start: Instant,
    /// Anchor meshes decoded and cached in the current window
    pub meshes_processed: u64,
    /// Batches accepted by the throttle in the current window
    pub batches_accepted: u64,
    /// Batches dropped by the throttle in the current window
    pub batches_throttled: u64,
    /// Anchors skipped by the decoder in the current window
    pub anchors_skipped: u64,
}

impl SessionMetrics {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: Instant::now(),
            meshes_processed: 0,
            batches_accepted: 0,
            batches_throttled: 0,
            anchors_skipped: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Time left in the current window, zero when it has elapsed.
    pub fn until_next_tick(&self, now: Instant) -> Duration {
        (self.window_start + self.window).saturating_duration_since(now)
    }

    /// Close the window if it has elapsed and return the update rate.
    ///
    /// A zero-length window never ticks.
    pub fn maybe_tick(&mut self, now: Instant) -> Option<f64> {
        if self.window.is_zero() {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let rate = self.meshes_processed as f64 / elapsed.as_secs_f64();
        if self.batches_accepted + self.batches_throttled > 0 {
            debug!(
                "SCAN METRICS: rate={:.1}/s, batches={} (throttled {}), skipped={}",
                rate, self.batches_accepted, self.batches_throttled, self.anchors_skipped
            );
        }

        self.reset_counters();
        self.window_start = now;
        Some(rate)
    }

    /// Start a fresh window (new scan).
    pub fn reset(&mut self, now: Instant) {
        self.reset_counters();
        self.window_start = now;
    }

    fn reset_counters(&mut self) {
        self.meshes_processed = 0;
        self.batches_accepted = 0;
        self.batches_throttled = 0;
        self.anchors_skipped = 0;
    }
}
