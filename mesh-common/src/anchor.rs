//! Per-anchor mesh updates delivered by the sensor service.

use glam::Mat4;
use meshscan_shared::AnchorId;

use crate::decode::{DecodeSkipped, RawIndexBuffer, RawVertexBuffer, decode_local_mesh};
use crate::mesh::WorldMesh;

/// The latest full geometry of one anchor.
///
/// Each update replaces everything previously known about the anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorUpdate {
    pub id: AnchorId,
    /// Anchor-local → world, column-major.
    pub transform: Mat4,
    pub vertices: RawVertexBuffer,
    pub faces: RawIndexBuffer,
}

impl AnchorUpdate {
    pub fn new(
        id: AnchorId,
        transform: Mat4,
        vertices: RawVertexBuffer,
        faces: RawIndexBuffer,
    ) -> Self {
        Self {
            id,
            transform,
            vertices,
            faces,
        }
    }

    /// Decode the raw buffers and move the result into the world frame.
    pub fn to_world_mesh(&self) -> Result<WorldMesh, DecodeSkipped> {
        Ok(decode_local_mesh(&self.vertices, &self.faces)?.into_world(&self.transform))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::decode::{encode_index_buffer, encode_vertex_buffer};

    #[test]
    fn test_update_decodes_into_world_frame() {
        let update = AnchorUpdate::new(
            AnchorId::from_u128(7),
            Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0)),
            encode_vertex_buffer(&[Vec3::ZERO, Vec3::X, Vec3::Y], 16),
            encode_index_buffer(&[[0, 1, 2]], 2).unwrap(),
        );

        let mesh = update.to_world_mesh().unwrap();
        assert_eq!(mesh.vertices()[1], Vec3::new(1.0, 0.0, -2.0));
        assert_eq!(mesh.triangles(), &[[0, 1, 2]]);
    }

    #[test]
    fn test_empty_update_is_skipped() {
        let update = AnchorUpdate::new(
            AnchorId::from_u128(7),
            Mat4::IDENTITY,
            RawVertexBuffer::default(),
            RawIndexBuffer::default(),
        );
        assert_eq!(update.to_world_mesh(), Err(DecodeSkipped::NoVertices));
    }
}
