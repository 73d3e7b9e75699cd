//! Scan session controller
//!
//! Runs the whole accumulation pipeline on one dedicated thread so the
//! sensor callback never waits on decoding, rendering or disk I/O.
//!
//! # Architecture
//!
//! ```text
//! Sensor callback        Session thread                      Export thread
//!     │                        │                                  │
//! [Anchor batch]──(bounded)──►[Throttle]                          │
//!     │                      [Decode → World → Cache]             │
//!     │                      [Project]──────► RenderSink          │
//! UI                           │                                  │
//! [stop_scan]────(bounded)──►[Snapshot]──────(move)─────────────►[Write OBJ/MTL]
//!     ▲                      [Poll result]◄──────(channel)────────[Done]
//!     └──────(watch)──────── [Publish ScanStatus]
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let handle = ScanSession::spawn(SessionOptions::from_config(&config)?, sensor, sink);
//! handle.start_scan()?;
//!
//! // From the sensor callback
//! handle.submit_anchors(AnchorBatch::updated(anchors));
//!
//! // Later, from the UI
//! handle.stop_scan()?;
//! let status = handle.wait_for(|s| s.state.is_finished()).await?;
//! ```

mod command;
mod handle;
mod metrics;
mod status;
mod thread;

use std::path::PathBuf;
use std::time::Duration;

// Re-export public API
pub use handle::ScanHandle;
pub use status::{SavedScan, ScanStatus};

use crate::config::Config;
use crate::error::ScanError;
use crate::export::ExportOptions;
use crate::projector::LiveMaterial;
use crate::sensor::{RenderSink, SensorService};
use crate::throttle::DEFAULT_MIN_INTERVAL;
use thread::SessionThread;

/// Settings fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub min_interval: Duration,
    /// Inbound queue depth (at least 1)
    pub channel_capacity: usize,
    /// Update rate measuring window; zero disables rate reporting
    pub rate_window: Duration,
    pub material: LiveMaterial,
    pub export: ExportOptions,
}

impl SessionOptions {
    /// Defaults, exporting into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            channel_capacity: 64,
            rate_window: Duration::from_secs(1),
            material: LiveMaterial::SCAN_OVERLAY,
            export: ExportOptions::new(output_dir),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ScanError> {
        Ok(Self {
            min_interval: config.throttle.min_interval(),
            channel_capacity: config.session.channel_capacity,
            rate_window: config.session.rate_window(),
            material: LiveMaterial::SCAN_OVERLAY,
            export: ExportOptions::from_config(&config.export)?,
        })
    }
}

/// Entry point for running a scan session.
pub struct ScanSession;

impl ScanSession {
    /// Start the session thread with `sensor` and `sink` moved onto it.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn a thread.
    pub fn spawn<S, R>(options: SessionOptions, sensor: S, sink: R) -> ScanHandle
    where
        S: SensorService,
        R: RenderSink,
    {
        SessionThread::spawn(options, sensor, sink)
    }
}
