//! Live display of cached anchor meshes.
//!
//! Each anchor owns at most one renderable in the external renderer. The
//! projector tracks that association in a generational arena: the first
//! projection of an anchor creates a renderable under a fresh
//! [`RenderHandle`], later projections replace its geometry under the same
//! handle, and detaching frees the slot and bumps its generation so an old
//! handle can never address whatever reuses the slot.

use hashbrown::HashMap;
use meshscan_common::WorldMesh;
use meshscan_shared::AnchorId;

use crate::sensor::RenderSink;

/// Identifies one renderable for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderHandle {
    index: u32,
    generation: u32,
}

impl RenderHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// GPU-ready geometry for one anchor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderMesh {
    pub positions: Vec<[f32; 3]>,
    /// Triangle list, three indices per triangle.
    pub indices: Vec<u32>,
}

impl RenderMesh {
    pub fn from_world(mesh: &WorldMesh) -> Self {
        Self {
            positions: mesh.vertices().iter().map(|v| v.to_array()).collect(),
            indices: mesh.triangles().iter().flatten().copied().collect(),
        }
    }
}

/// Material applied to every live renderable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveMaterial {
    /// Linear RGBA; alpha < 1 so the camera feed shows through.
    pub color: [f32; 4],
    pub roughness: f32,
    pub metallic: bool,
}

impl LiveMaterial {
    /// Translucent teal overlay.
    pub const SCAN_OVERLAY: Self = Self {
        color: [0.19, 0.69, 0.78, 0.35],
        roughness: 1.0,
        metallic: false,
    };
}

impl Default for LiveMaterial {
    fn default() -> Self {
        Self::SCAN_OVERLAY
    }
}

/// Outcome of [`LiveMeshProjector::project`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Created(RenderHandle),
    Replaced(RenderHandle),
    /// Nothing drawable; any existing renderable is left as it was.
    Skipped,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    occupant: Option<AnchorId>,
}

/// Keeps the renderer's scene in step with the mesh cache.
#[derive(Debug, Default)]
pub struct LiveMeshProjector {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_anchor: HashMap<AnchorId, RenderHandle>,
    material: LiveMaterial,
}

impl LiveMeshProjector {
    pub fn new(material: LiveMaterial) -> Self {
        Self {
            material,
            ..Self::default()
        }
    }

    /// Create or replace the renderable for `id`.
    pub fn project<S>(&mut self, id: AnchorId, mesh: &WorldMesh, sink: &mut S) -> Projection
    where
        S: RenderSink + ?Sized,
    {
        if mesh.is_empty() {
            return Projection::Skipped;
        }

        let render_mesh = RenderMesh::from_world(mesh);
        match self.by_anchor.get(&id) {
            Some(&handle) => {
                sink.upsert_renderable(id, handle, &render_mesh, &self.material);
                Projection::Replaced(handle)
            }
            None => {
                let handle = self.allocate(id);
                self.by_anchor.insert(id, handle);
                sink.upsert_renderable(id, handle, &render_mesh, &self.material);
                Projection::Created(handle)
            }
        }
    }

    /// Remove the renderable for `id`, if any.
    pub fn detach<S>(&mut self, id: AnchorId, sink: &mut S) -> Option<RenderHandle>
    where
        S: RenderSink + ?Sized,
    {
        let handle = self.by_anchor.remove(&id)?;
        let slot = &mut self.slots[handle.index as usize];
        slot.occupant = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        sink.remove_renderable(id, handle);
        Some(handle)
    }

    /// Remove every renderable.
    pub fn clear<S>(&mut self, sink: &mut S)
    where
        S: RenderSink + ?Sized,
    {
        let ids: Vec<AnchorId> = self.by_anchor.keys().copied().collect();
        for id in ids {
            self.detach(id, sink);
        }
    }

    pub fn handle_of(&self, id: AnchorId) -> Option<RenderHandle> {
        self.by_anchor.get(&id).copied()
    }

    /// Whether `handle` still names a live renderable.
    pub fn is_live(&self, handle: RenderHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.generation == handle.generation && slot.occupant.is_some())
    }

    pub fn len(&self) -> usize {
        self.by_anchor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_anchor.is_empty()
    }

    pub fn material(&self) -> &LiveMaterial {
        &self.material
    }

    fn allocate(&mut self, id: AnchorId) -> RenderHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.occupant = Some(id);
        RenderHandle {
            index,
            generation: slot.generation,
        }
    }
}
