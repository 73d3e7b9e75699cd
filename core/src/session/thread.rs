//! Scan session thread implementation
//!
//! Owns the cache, throttle, projector, sensor and render sink; every
//! mutation of scan state happens here.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use hashbrown::HashSet;
use meshscan_shared::{AnchorId, ScanState};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::SessionOptions;
use super::command::{PendingRemovals, SessionCommand};
use super::handle::ScanHandle;
use super::metrics::SessionMetrics;
use super::status::{SavedScan, ScanStatus};
use crate::cache::MeshCache;
use crate::error::ScanError;
use crate::export::{ExportOptions, ExportedModel, export_snapshot};
use crate::projector::LiveMeshProjector;
use crate::sensor::{AnchorBatch, RenderSink, SensorService};
use crate::throttle::UpdateThrottle;

/// How often a pending export is checked for completion
const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Wake-up interval when no rate window is configured
const IDLE_WAIT: Duration = Duration::from_secs(1);

type ExportResult = Result<ExportedModel, ScanError>;

pub(super) struct SessionThread<S: SensorService, R: RenderSink> {
    /// Commands from the handle
    rx: mpsc::Receiver<SessionCommand>,

    /// Removals the handle could not queue
    pending_removals: PendingRemovals,

    /// Anchors removed out of queue order; later batches may not revive them
    parked_removed: HashSet<AnchorId>,

    /// Published status
    status: watch::Sender<ScanStatus>,

    sensor: S,
    sink: R,

    cache: MeshCache,
    throttle: UpdateThrottle,
    projector: LiveMeshProjector,
    export_options: ExportOptions,

    /// Result of the background export, while one is running
    export_rx: Option<mpsc::Receiver<ExportResult>>,

    state: ScanState,
    metrics: SessionMetrics,
}

impl<S: SensorService, R: RenderSink> SessionThread<S, R> {
    /// Spawn the session thread
    ///
    /// Returns the handle through which the session is driven.
    pub fn spawn(options: SessionOptions, sensor: S, sink: R) -> ScanHandle {
        let (tx, rx) = mpsc::sync_channel::<SessionCommand>(options.channel_capacity.max(1));
        let (status_tx, status_rx) = watch::channel(ScanStatus::default());
        let pending_removals = PendingRemovals::default();
        let thread_pending = pending_removals.clone();

        let handle = thread::Builder::new()
            .name("scan-session".into())
            .spawn(move || {
                let mut session = Self {
                    rx,
                    pending_removals: thread_pending,
                    parked_removed: HashSet::new(),
                    status: status_tx,
                    sensor,
                    sink,
                    cache: MeshCache::new(),
                    throttle: UpdateThrottle::new(options.min_interval),
                    projector: LiveMeshProjector::new(options.material),
                    export_options: options.export,
                    export_rx: None,
                    state: ScanState::Idle,
                    metrics: SessionMetrics::new(options.rate_window),
                };
                session.run();
            })
            .expect("failed to spawn scan session thread");

        ScanHandle {
            tx: Some(tx),
            handle: Some(handle),
            status: status_rx,
            pending_removals,
        }
    }

    fn run(&mut self) {
        debug!("Scan session thread started");

        loop {
            match self.rx.recv_timeout(self.next_wake(Instant::now())) {
                Ok(command) => {
                    self.apply_parked_removals();
                    self.handle_command(command);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => self.apply_parked_removals(),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    debug!("Scan session thread exiting (channel disconnected)");
                    break;
                }
            }

            self.poll_export();

            if let Some(rate) = self.metrics.maybe_tick(Instant::now()) {
                self.status.send_modify(|s| s.update_rate = rate);
            }
        }

        self.finish_pending_export();
        if self.state == ScanState::Scanning {
            self.sensor.stop();
        }
        self.projector.clear(&mut self.sink);

        debug!("Scan session thread finished");
    }

    fn next_wake(&self, now: Instant) -> Duration {
        let tick = if self.metrics.window().is_zero() {
            IDLE_WAIT
        } else {
            self.metrics.until_next_tick(now)
        };
        let wait = if self.export_rx.is_some() {
            tick.min(EXPORT_POLL_INTERVAL)
        } else {
            tick
        };
        wait.max(Duration::from_millis(1))
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::StartScan => self.start_scan(),
            SessionCommand::StopScan => self.stop_scan(),
            SessionCommand::Anchors(batch) => self.ingest(batch),
            SessionCommand::Removed(ids) => self.remove(ids),
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.cache.snapshot());
            }
        }
    }

    fn start_scan(&mut self) {
        if !self.state.accepts_start() {
            debug!("Ignoring start request while {}", self.state);
            return;
        }

        self.state = ScanState::Preparing;
        self.status.send_modify(|s| {
            s.state = ScanState::Preparing;
            s.error_message = None;
        });

        let Some(mode) = self.sensor.reconstruction_support().best_mode() else {
            self.fail(ScanError::CapabilityUnsupported);
            return;
        };

        self.cache.clear();
        self.parked_removed.clear();
        self.projector.clear(&mut self.sink);
        self.throttle.reset();
        self.metrics.reset(Instant::now());

        if let Err(e) = self.sensor.start(mode) {
            self.fail(ScanError::SensorStart(format!("{e:#}")));
            return;
        }

        self.state = ScanState::Scanning;
        self.status.send_modify(|s| {
            s.state = ScanState::Scanning;
            s.anchor_count = 0;
            s.update_rate = 0.0;
            s.saved = None;
            s.mode = Some(mode);
        });
        self.log("starting scan");
    }

    fn stop_scan(&mut self) {
        if self.state != ScanState::Scanning {
            debug!("Ignoring stop request while {}", self.state);
            return;
        }

        self.state = ScanState::Finishing;
        self.status.send_modify(|s| s.state = ScanState::Finishing);
        self.log("finishing scan");
        self.sensor.stop();

        let snapshot = self.cache.snapshot();
        let options = self.export_options.clone();
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("scan-export".into())
            .spawn(move || {
                let _ = tx.send(export_snapshot(&snapshot, &options));
            });
        match spawned {
            Ok(_) => self.export_rx = Some(rx),
            Err(e) => self.export_failed(ScanError::export_io("starting the export thread", e)),
        }
    }

    fn ingest(&mut self, batch: AnchorBatch) {
        if self.state != ScanState::Scanning {
            trace!("Ignoring {:?} batch while {}", batch.kind, self.state);
            return;
        }
        if batch.anchors.is_empty() {
            return;
        }
        if !self.throttle.try_accept(batch.received_at) {
            self.metrics.batches_throttled += 1;
            trace!("Throttled {:?} batch of {} anchors", batch.kind, batch.anchors.len());
            return;
        }
        self.metrics.batches_accepted += 1;

        for update in &batch.anchors {
            if self.parked_removed.contains(&update.id) {
                trace!("Ignoring update of removed anchor {}", update.id);
                continue;
            }
            match update.to_world_mesh() {
                Ok(mesh) => {
                    self.metrics.meshes_processed += 1;
                    let mesh = self.cache.upsert(update.id, mesh);
                    self.projector.project(update.id, &mesh, &mut self.sink);
                }
                Err(skipped) => {
                    self.metrics.anchors_skipped += 1;
                    trace!("Skipping anchor {}: {}", update.id, skipped);
                }
            }
        }

        self.publish_anchor_count();
    }

    fn remove(&mut self, ids: Vec<AnchorId>) {
        if self.state != ScanState::Scanning {
            trace!("Ignoring removal of {} anchors while {}", ids.len(), self.state);
            return;
        }
        for id in ids {
            self.detach(id);
        }
        self.publish_anchor_count();
    }

    /// Apply removals parked by the handle while the queue was full.
    fn apply_parked_removals(&mut self) {
        let parked = self.pending_removals.take();
        if parked.is_empty() {
            return;
        }
        if self.state != ScanState::Scanning {
            trace!("Ignoring {} parked removals while {}", parked.len(), self.state);
            return;
        }
        debug!("Applying {} parked anchor removals", parked.len());
        for id in parked {
            self.detach(id);
            self.parked_removed.insert(id);
        }
        self.publish_anchor_count();
    }

    fn detach(&mut self, id: AnchorId) {
        self.cache.remove(id);
        self.projector.detach(id, &mut self.sink);
    }

    fn poll_export(&mut self) {
        let Some(ref receiver) = self.export_rx else {
            return;
        };
        match receiver.try_recv() {
            Ok(result) => {
                self.export_rx = None;
                self.export_finished(result);
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => {
                self.export_rx = None;
                self.export_finished(Err(export_thread_lost()));
            }
        }
    }

    /// Block until a running export reports back (shutdown path).
    fn finish_pending_export(&mut self) {
        if let Some(receiver) = self.export_rx.take() {
            debug!("Waiting for export to finish before shutdown");
            let result = receiver.recv().unwrap_or_else(|_| Err(export_thread_lost()));
            self.export_finished(result);
        }
    }

    fn export_finished(&mut self, result: ExportResult) {
        match result {
            Ok(model) => {
                self.state = ScanState::Saved;
                let saved = SavedScan::from(&model);
                self.status.send_modify(|s| {
                    s.state = ScanState::Saved;
                    s.saved = Some(saved);
                });
                let name = model
                    .obj_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.log(&format!("saved: {name}"));
            }
            Err(e) => self.export_failed(e),
        }
    }

    fn export_failed(&mut self, error: ScanError) {
        let message = format!("Export failed: {error}");
        self.enter_error(message);
    }

    fn fail(&mut self, error: ScanError) {
        self.enter_error(error.to_string());
    }

    /// Move to `Error`. The next start request is accepted again.
    fn enter_error(&mut self, message: String) {
        warn!("Scan failed: {}", message);
        if self.state == ScanState::Scanning {
            self.sensor.stop();
        }
        self.state = ScanState::Error;
        self.export_rx = None;
        self.status.send_modify(|s| {
            s.state = ScanState::Error;
            s.last_log = message.clone();
            s.error_message = Some(message);
        });
    }

    fn publish_anchor_count(&self) {
        let count = self.cache.len();
        self.status.send_if_modified(|s| {
            let changed = s.anchor_count != count;
            s.anchor_count = count;
            changed
        });
    }

    /// Log a session line and mirror it into the status.
    fn log(&self, message: &str) {
        info!("{}", message);
        self.status.send_modify(|s| s.last_log = message.to_string());
    }
}

fn export_thread_lost() -> ScanError {
    ScanError::export_io(
        "waiting for the export thread",
        std::io::Error::other("export thread exited without a result"),
    )
}
