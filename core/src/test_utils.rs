//! Shared test utilities for unit and integration tests

use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec3};
use hashbrown::HashSet;
use meshscan_common::{AnchorUpdate, encode_index_buffer, encode_vertex_buffer};
use meshscan_shared::AnchorId;

use crate::projector::{LiveMaterial, RenderHandle, RenderMesh};
use crate::sensor::{ReconstructionMode, ReconstructionSupport, RenderSink, SensorService};

// ============================================================================
// Test Sensor
// ============================================================================

/// Calls the session made into the sensor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SensorLog {
    pub starts: Vec<ReconstructionMode>,
    pub stops: usize,
}

/// Scripted sensor; clones share one log.
#[derive(Debug, Clone)]
pub struct FakeSensor {
    support: ReconstructionSupport,
    fail_start: bool,
    log: Arc<Mutex<SensorLog>>,
}

impl FakeSensor {
    pub fn new(support: ReconstructionSupport) -> Self {
        Self {
            support,
            fail_start: false,
            log: Arc::default(),
        }
    }

    /// Make every `start` call fail.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn log(&self) -> SensorLog {
        self.log.lock().unwrap().clone()
    }
}

impl SensorService for FakeSensor {
    fn reconstruction_support(&self) -> ReconstructionSupport {
        self.support
    }

    fn start(&mut self, mode: ReconstructionMode) -> anyhow::Result<()> {
        if self.fail_start {
            anyhow::bail!("camera permission denied");
        }
        self.log.lock().unwrap().starts.push(mode);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stops += 1;
    }
}

// ============================================================================
// Test Renderer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Upsert {
        id: AnchorId,
        handle: RenderHandle,
        mesh: RenderMesh,
        material: LiveMaterial,
    },
    Remove {
        id: AnchorId,
        handle: RenderHandle,
    },
}

/// Renderer that records every call; clones share one event list.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Renderables created and not yet removed.
    pub fn live_count(&self) -> usize {
        let mut live = HashSet::new();
        for event in self.events.lock().unwrap().iter() {
            match event {
                SinkEvent::Upsert { handle, .. } => {
                    live.insert(*handle);
                }
                SinkEvent::Remove { handle, .. } => {
                    live.remove(handle);
                }
            }
        }
        live.len()
    }
}

impl RenderSink for RecordingSink {
    fn upsert_renderable(
        &mut self,
        id: AnchorId,
        handle: RenderHandle,
        mesh: &RenderMesh,
        material: &LiveMaterial,
    ) {
        self.events.lock().unwrap().push(SinkEvent::Upsert {
            id,
            handle,
            mesh: mesh.clone(),
            material: *material,
        });
    }

    fn remove_renderable(&mut self, id: AnchorId, handle: RenderHandle) {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Remove { id, handle });
    }
}

// ============================================================================
// Geometry
// ============================================================================

pub fn anchor(n: u128) -> AnchorId {
    AnchorId::from_u128(n)
}

/// Anchor update packed the way sensors do (padded stride, 32-bit indices).
pub fn mesh_update(
    id: u128,
    transform: Mat4,
    vertices: &[Vec3],
    triangles: &[[u32; 3]],
) -> AnchorUpdate {
    AnchorUpdate::new(
        anchor(id),
        transform,
        encode_vertex_buffer(vertices, 16),
        encode_index_buffer(triangles, 4).unwrap(),
    )
}

/// Unit right triangle `(0,0,0) (1,0,0) (0,1,0)` in the anchor frame.
pub fn triangle_update(id: u128, transform: Mat4) -> AnchorUpdate {
    mesh_update(id, transform, &[Vec3::ZERO, Vec3::X, Vec3::Y], &[[0, 1, 2]])
}
