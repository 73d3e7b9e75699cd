//! Procedural captures for demos and tests.
//!
//! [`demo_room`] records a small room being scanned: a floor that grows,
//! three walls, and a table anchor that is tracked briefly and then lost.

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use glam::{Mat4, Vec3};
use meshscan_common::formats::{CaptureEvent, CaptureRecord};
use meshscan_common::{
    AnchorUpdate, RawIndexBuffer, encode_index_buffer, encode_vertex_buffer,
};
use meshscan_shared::AnchorId;

pub const FLOOR: AnchorId = AnchorId::from_u128(0x0f10_0000_0000_4000_8000_0000_0000_0001);
pub const TABLE: AnchorId = AnchorId::from_u128(0x0f10_0000_0000_4000_8000_0000_0000_0005);

const ROOM_SIZE: f32 = 4.0;
const WALL_HEIGHT: f32 = 2.5;

/// Flat grid in the anchor's XZ plane, centred on the origin.
///
/// `cells` subdivisions per side give `(cells + 1)²` vertices and
/// `2 * cells²` triangles.
pub fn grid(width: f32, depth: f32, cells: u32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let cells = cells.max(1);
    let side = cells + 1;
    let mut vertices = Vec::with_capacity((side * side) as usize);
    for row in 0..side {
        for col in 0..side {
            let u = col as f32 / cells as f32 - 0.5;
            let v = row as f32 / cells as f32 - 0.5;
            vertices.push(Vec3::new(u * width, 0.0, v * depth));
        }
    }

    let mut triangles = Vec::with_capacity((2 * cells * cells) as usize);
    for row in 0..cells {
        for col in 0..cells {
            let a = row * side + col;
            let b = a + 1;
            let c = a + side;
            let d = c + 1;
            triangles.push([a, c, b]);
            triangles.push([b, c, d]);
        }
    }
    (vertices, triangles)
}

fn wall_id(n: u128) -> AnchorId {
    AnchorId::from_u128(0x0f10_0000_0000_4000_8000_0000_0000_0001 + n)
}

fn packed(
    id: AnchorId,
    transform: Mat4,
    (vertices, triangles): (Vec<Vec3>, Vec<[u32; 3]>),
    stride: usize,
) -> AnchorUpdate {
    let faces = encode_index_buffer(&triangles, 2).unwrap_or_else(|| wide_indices(&triangles));
    AnchorUpdate::new(id, transform, encode_vertex_buffer(&vertices, stride), faces)
}

fn wide_indices(triangles: &[[u32; 3]]) -> RawIndexBuffer {
    let bytes = triangles
        .iter()
        .flatten()
        .flat_map(|index| index.to_ne_bytes())
        .collect();
    RawIndexBuffer::new(bytes, 4, 3, triangles.len())
}

fn floor(cells: u32) -> AnchorUpdate {
    packed(FLOOR, Mat4::IDENTITY, grid(ROOM_SIZE, ROOM_SIZE, cells), 16)
}

/// Wall `n` (1..=3): upright on the floor's edge, facing the room centre.
fn wall(n: u128, cells: u32) -> AnchorUpdate {
    let half = ROOM_SIZE / 2.0;
    let (position, yaw) = match n {
        1 => (Vec3::new(0.0, WALL_HEIGHT / 2.0, -half), 0.0),
        2 => (Vec3::new(-half, WALL_HEIGHT / 2.0, 0.0), FRAC_PI_2),
        _ => (Vec3::new(half, WALL_HEIGHT / 2.0, 0.0), -FRAC_PI_2),
    };
    let transform = Mat4::from_translation(position)
        * Mat4::from_rotation_y(yaw)
        * Mat4::from_rotation_x(FRAC_PI_2);
    packed(wall_id(n), transform, grid(ROOM_SIZE, WALL_HEIGHT, cells), 12)
}

fn table() -> AnchorUpdate {
    packed(
        TABLE,
        Mat4::from_translation(Vec3::new(0.5, 0.75, 0.5)),
        grid(1.2, 0.8, 1),
        16,
    )
}

/// A scripted room scan.
///
/// Replayed with the default throttle it leaves the floor at 4x4 cells and
/// three 3x3-cell walls in the cache: 73 vertices and 86 triangles.
pub fn demo_room() -> Vec<CaptureRecord> {
    let at = Duration::from_millis;
    vec![
        CaptureRecord::new(at(0), CaptureEvent::Added(vec![floor(2)])),
        CaptureRecord::new(at(100), CaptureEvent::Added(vec![wall(1, 2), wall(2, 3)])),
        CaptureRecord::new(at(200), CaptureEvent::Updated(vec![floor(4)])),
        CaptureRecord::new(at(300), CaptureEvent::Added(vec![wall(3, 3), table()])),
        // Inside the throttle interval of the 300 ms batch, so dropped
        CaptureRecord::new(at(340), CaptureEvent::Updated(vec![floor(8)])),
        CaptureRecord::new(at(500), CaptureEvent::Removed(vec![TABLE])),
        CaptureRecord::new(at(600), CaptureEvent::Updated(vec![wall(1, 3)])),
    ]
}
