//! Triangle meshes in anchor-local and world coordinates.

use glam::{Mat4, Vec3};

use crate::decode::DecodeSkipped;

/// One anchor's geometry in its own coordinate frame.
///
/// Every triangle index is below `vertices().len()`; the constructor checks it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalMesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

impl LocalMesh {
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Result<Self, DecodeSkipped> {
        let vertex_count = vertices.len();
        if let Some(&index) = triangles
            .iter()
            .flatten()
            .find(|&&index| index as usize >= vertex_count)
        {
            return Err(DecodeSkipped::IndexOutOfRange {
                index,
                vertex_count,
            });
        }
        Ok(Self {
            vertices,
            triangles,
        })
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Move every vertex into the world frame.
    ///
    /// Vertices are treated as points `(x, y, z, 1)`; the result keeps `xyz`
    /// without a perspective divide. Triangles are unchanged.
    pub fn to_world(&self, transform: &Mat4) -> WorldMesh {
        WorldMesh {
            vertices: transform_points(&self.vertices, transform),
            triangles: self.triangles.clone(),
        }
    }

    /// Consuming variant of [`to_world`](Self::to_world).
    pub fn into_world(self, transform: &Mat4) -> WorldMesh {
        WorldMesh {
            vertices: transform_points(&self.vertices, transform),
            triangles: self.triangles,
        }
    }
}

fn transform_points(points: &[Vec3], transform: &Mat4) -> Vec<Vec3> {
    points
        .iter()
        .map(|p| transform.mul_vec4(p.extend(1.0)).truncate())
        .collect()
}

/// One anchor's geometry in the shared world frame.
///
/// Only obtainable from [`LocalMesh`], so the index invariant carries over.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldMesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

impl WorldMesh {
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// True when there is nothing to draw or export.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangles.is_empty()
    }
}
