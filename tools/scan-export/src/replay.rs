//! Drive a scan session from a recorded capture.
//!
//! The recorded timestamps become the batches' delivery stamps, so the
//! session throttles a replay exactly as it throttled the live scan, with
//! or without real-time pacing.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use hashbrown::HashSet;
use meshscan_common::formats::{CaptureEvent, CaptureRecord};
use meshscan_core::{
    AnchorBatch, BatchKind, LiveMaterial, ReconstructionMode, ReconstructionSupport,
    RenderHandle, RenderMesh, RenderSink, SavedScan, ScanSession, ScanState, SensorService,
    SessionOptions,
};
use meshscan_shared::AnchorId;
use tracing::{debug, info};

/// How long to wait for the export once the scan is stopped.
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sensor stand-in for replays; the capture is the sensor.
#[derive(Debug, Clone, Copy)]
pub struct ReplaySensor {
    support: ReconstructionSupport,
}

impl ReplaySensor {
    pub fn new(support: ReconstructionSupport) -> Self {
        Self { support }
    }
}

impl Default for ReplaySensor {
    fn default() -> Self {
        Self::new(ReconstructionSupport::MeshWithClassification)
    }
}

impl SensorService for ReplaySensor {
    fn reconstruction_support(&self) -> ReconstructionSupport {
        self.support
    }

    fn start(&mut self, mode: ReconstructionMode) -> Result<()> {
        debug!("Replay sensor started ({:?})", mode);
        Ok(())
    }

    fn stop(&mut self) {
        debug!("Replay sensor stopped");
    }
}

/// What a [`CountingSink`] was asked to draw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Geometry uploads, creations and replacements alike
    pub upserts: usize,
    pub removals: usize,
    /// Renderables shown when the stats were taken
    pub live: usize,
    pub peak_live: usize,
}

#[derive(Debug, Default)]
struct SinkState {
    stats: RenderStats,
    live: HashSet<RenderHandle>,
}

/// Renderer that only counts what it is asked to draw.
#[derive(Debug, Clone, Default)]
pub struct CountingSink {
    state: Arc<Mutex<SinkState>>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RenderStats {
        self.lock().stats.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        // Counters stay meaningful even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RenderSink for CountingSink {
    fn upsert_renderable(
        &mut self,
        _id: AnchorId,
        handle: RenderHandle,
        _mesh: &RenderMesh,
        _material: &LiveMaterial,
    ) {
        let mut state = self.lock();
        state.stats.upserts += 1;
        if state.live.insert(handle) {
            state.stats.live = state.live.len();
            state.stats.peak_live = state.stats.peak_live.max(state.stats.live);
        }
    }

    fn remove_renderable(&mut self, _id: AnchorId, handle: RenderHandle) {
        let mut state = self.lock();
        state.stats.removals += 1;
        state.live.remove(&handle);
        state.stats.live = state.live.len();
    }
}

/// Replay settings.
#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    /// Sleep between records so they arrive at their recorded pace
    pub realtime: bool,
    pub export_timeout: Duration,
    /// Capability the replayed device reports
    pub support: ReconstructionSupport,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            realtime: false,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
            support: ReconstructionSupport::MeshWithClassification,
        }
    }
}

/// Result of a successful replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub saved: SavedScan,
    /// Anchors in the cache when the scan was stopped
    pub anchor_count: usize,
    pub render: RenderStats,
}

/// Run `records` through a fresh session and export the result.
///
/// Fails when the session refuses to scan, the capture leaves nothing to
/// export, or the export does not finish within `export_timeout`.
pub fn replay_capture(
    records: &[CaptureRecord],
    session: SessionOptions,
    options: ReplayOptions,
) -> Result<ReplayReport> {
    let sink = CountingSink::new();
    let handle = ScanSession::spawn(session, ReplaySensor::new(options.support), sink.clone());

    handle.start_scan()?;
    // Round trip so the start has been handled before checking it
    handle.snapshot()?;
    let status = handle.status();
    if status.state != ScanState::Scanning {
        bail!(
            "Session did not start scanning: {}",
            status.error_message.unwrap_or(status.last_log)
        );
    }

    let start = Instant::now();
    for record in records {
        let received_at = start + record.at;
        if options.realtime {
            thread::sleep(received_at.saturating_duration_since(Instant::now()));
        }
        match &record.event {
            CaptureEvent::Added(anchors) => handle.submit_anchors_blocking(
                AnchorBatch::new(BatchKind::Added, anchors.clone()).received_at(received_at),
            )?,
            CaptureEvent::Updated(anchors) => handle.submit_anchors_blocking(
                AnchorBatch::new(BatchKind::Updated, anchors.clone()).received_at(received_at),
            )?,
            CaptureEvent::Removed(ids) => handle.remove_anchors(ids.clone())?,
        }
    }

    let anchor_count = handle.snapshot()?.len();
    info!(
        "Replayed {} records, {} anchors cached",
        records.len(),
        anchor_count
    );

    handle.stop_scan()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to build runtime")?;
    let status = runtime
        .block_on(async {
            tokio::time::timeout(
                options.export_timeout,
                handle.wait_for(|status| status.state.is_finished()),
            )
            .await
        })
        .context("Timed out waiting for the export")??;

    match status.saved {
        Some(saved) if status.state == ScanState::Saved => Ok(ReplayReport {
            saved,
            anchor_count,
            render: sink.stats(),
        }),
        _ => bail!(
            "{}",
            status
                .error_message
                .unwrap_or_else(|| "Scan finished without saving".to_string())
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use glam::{Mat4, Vec3};
    use meshscan_common::{AnchorUpdate, encode_index_buffer, encode_vertex_buffer};
    use tempfile::tempdir;

    use super::*;

    fn triangle(id: u128, transform: Mat4) -> AnchorUpdate {
        AnchorUpdate::new(
            AnchorId::from_u128(id),
            transform,
            encode_vertex_buffer(&[Vec3::ZERO, Vec3::X, Vec3::Y], 16),
            encode_index_buffer(&[[0, 1, 2]], 4).unwrap(),
        )
    }

    fn added(ms: u64, anchors: Vec<AnchorUpdate>) -> CaptureRecord {
        CaptureRecord::new(Duration::from_millis(ms), CaptureEvent::Added(anchors))
    }

    #[test]
    fn test_replay_writes_obj() {
        let dir = tempdir().unwrap();
        let records = vec![added(0, vec![triangle(1, Mat4::IDENTITY)])];

        let report = replay_capture(
            &records,
            SessionOptions::new(dir.path()),
            ReplayOptions::default(),
        )
        .unwrap();

        assert_eq!(report.anchor_count, 1);
        assert_eq!(report.saved.vertex_count, 3);
        assert_eq!(report.saved.triangle_count, 1);
        let obj = fs::read_to_string(&report.saved.obj_path).unwrap();
        assert!(obj.contains("f 1 2 3"));
        assert!(report.saved.mtl_path.exists());
    }

    #[test]
    fn test_replay_throttles_by_recorded_time() {
        let dir = tempdir().unwrap();
        let records = vec![
            added(0, vec![triangle(1, Mat4::IDENTITY)]),
            // Inside the throttle interval of the first batch
            added(20, vec![triangle(2, Mat4::IDENTITY)]),
            added(200, vec![triangle(3, Mat4::IDENTITY)]),
        ];

        let report = replay_capture(
            &records,
            SessionOptions::new(dir.path()),
            ReplayOptions::default(),
        )
        .unwrap();

        assert_eq!(report.anchor_count, 2);
        assert_eq!(report.saved.triangle_count, 2);
    }

    #[test]
    fn test_replay_counts_renderables() {
        let dir = tempdir().unwrap();
        let records = vec![
            added(0, vec![triangle(1, Mat4::IDENTITY), triangle(2, Mat4::IDENTITY)]),
            CaptureRecord::new(
                Duration::from_millis(100),
                CaptureEvent::Updated(vec![triangle(1, Mat4::from_translation(Vec3::Z))]),
            ),
            CaptureRecord::new(
                Duration::from_millis(150),
                CaptureEvent::Removed(vec![AnchorId::from_u128(2)]),
            ),
        ];

        let report = replay_capture(
            &records,
            SessionOptions::new(dir.path()),
            ReplayOptions::default(),
        )
        .unwrap();

        assert_eq!(report.anchor_count, 1);
        assert_eq!(report.render.upserts, 3);
        assert_eq!(report.render.removals, 1);
        assert_eq!(report.render.peak_live, 2);
    }

    #[test]
    fn test_replay_of_empty_capture_fails() {
        let dir = tempdir().unwrap();
        let err = replay_capture(&[], SessionOptions::new(dir.path()), ReplayOptions::default())
            .unwrap_err();

        assert!(err.to_string().contains("No mesh data captured"));
        assert_eq!(fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
    }

    #[test]
    fn test_unsupported_device_fails_before_feeding() {
        let dir = tempdir().unwrap();
        let records = vec![added(0, vec![triangle(1, Mat4::IDENTITY)])];
        let options = ReplayOptions {
            support: ReconstructionSupport::Unsupported,
            ..ReplayOptions::default()
        };

        let err = replay_capture(&records, SessionOptions::new(dir.path()), options).unwrap_err();

        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_realtime_replay_keeps_recorded_pace() {
        let dir = tempdir().unwrap();
        let records = vec![
            added(0, vec![triangle(1, Mat4::IDENTITY)]),
            added(120, vec![triangle(2, Mat4::IDENTITY)]),
        ];
        let options = ReplayOptions {
            realtime: true,
            ..ReplayOptions::default()
        };

        let started = Instant::now();
        let report = replay_capture(&records, SessionOptions::new(dir.path()), options).unwrap();

        assert!(started.elapsed() >= Duration::from_millis(120));
        assert_eq!(report.anchor_count, 2);
    }
}
