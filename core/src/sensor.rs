//! Boundaries to the sensor service and the renderer.
//!
//! The session drives a [`SensorService`] and feeds a [`RenderSink`]; both
//! are moved onto the session thread. Sensor callbacks reach the session
//! through [`ScanHandle`](crate::session::ScanHandle) as [`AnchorBatch`]es.

use std::time::Instant;

use meshscan_common::AnchorUpdate;
use meshscan_shared::AnchorId;
use serde::{Deserialize, Serialize};

use crate::projector::{LiveMaterial, RenderHandle, RenderMesh};

/// Which kind of scene reconstruction the device can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconstructionSupport {
    Unsupported,
    Mesh,
    MeshWithClassification,
}

impl ReconstructionSupport {
    /// The richest mode available, preferring classification.
    pub fn best_mode(self) -> Option<ReconstructionMode> {
        match self {
            Self::Unsupported => None,
            Self::Mesh => Some(ReconstructionMode::Mesh),
            Self::MeshWithClassification => Some(ReconstructionMode::MeshWithClassification),
        }
    }
}

/// Mode a scan runs in.
///
/// Classification labels are requested when available but not decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconstructionMode {
    Mesh,
    MeshWithClassification,
}

/// The external tracking and scene-reconstruction service.
pub trait SensorService: Send + 'static {
    fn reconstruction_support(&self) -> ReconstructionSupport;

    /// Begin tracking with scene reconstruction in `mode`.
    fn start(&mut self, mode: ReconstructionMode) -> anyhow::Result<()>;

    /// Pause tracking. Called once per scan when it finishes or fails.
    fn stop(&mut self);
}

/// The external renderer showing live scan geometry.
pub trait RenderSink: Send + 'static {
    /// Create the renderable for `handle`, or replace its geometry.
    fn upsert_renderable(
        &mut self,
        id: AnchorId,
        handle: RenderHandle,
        mesh: &RenderMesh,
        material: &LiveMaterial,
    );

    fn remove_renderable(&mut self, id: AnchorId, handle: RenderHandle);
}

/// Whether a batch reports new anchors or changed ones.
///
/// Both are handled the same way; the distinction is kept for logs and
/// capture recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Added,
    Updated,
}

/// One sensor callback's worth of anchor updates.
#[derive(Debug, Clone)]
pub struct AnchorBatch {
    pub kind: BatchKind,
    /// When the sensor delivered the batch; the throttle compares these.
    pub received_at: Instant,
    pub anchors: Vec<AnchorUpdate>,
}

impl AnchorBatch {
    pub fn new(kind: BatchKind, anchors: Vec<AnchorUpdate>) -> Self {
        Self {
            kind,
            received_at: Instant::now(),
            anchors,
        }
    }

    pub fn added(anchors: Vec<AnchorUpdate>) -> Self {
        Self::new(BatchKind::Added, anchors)
    }

    pub fn updated(anchors: Vec<AnchorUpdate>) -> Self {
        Self::new(BatchKind::Updated, anchors)
    }

    /// Override the delivery stamp (replays use recorded timing).
    pub fn received_at(mut self, at: Instant) -> Self {
        self.received_at = at;
        self
    }
}
