//! Raw sensor buffer decoding.
//!
//! Sensor services hand each mesh fragment over as two untyped byte buffers:
//! packed `[f32; 3]` positions at an arbitrary stride, and triangle indices
//! that are either 16 or 32 bits wide. Both use the producing machine's
//! native byte order and carry no alignment guarantee.
//!
//! # Layout
//! ```text
//! vertices: offset + i * stride        → [f32; 3] (12 bytes, rest of stride skipped)
//! faces:    offset + p * width * n     → n indices of `width` bytes (n must be 3)
//! ```

use bytemuck::pod_read_unaligned;
use glam::Vec3;

use crate::mesh::LocalMesh;

/// Size of one packed position (`[f32; 3]`).
pub const VERTEX_SIZE: usize = 12;

/// Why an anchor update produced no mesh.
///
/// None of these are failures of the session: empty buffers are normal while
/// the sensor is still refining a fragment, and malformed ones are skipped
/// until the next update replaces them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeSkipped {
    #[error("vertex buffer is empty")]
    NoVertices,

    #[error("index buffer has no primitives")]
    NoFaces,

    #[error("unsupported topology: {indices_per_primitive} indices per primitive, expected 3")]
    UnsupportedTopology { indices_per_primitive: usize },

    #[error("unsupported index width: {bytes_per_index} bytes, expected 2 or 4")]
    UnsupportedIndexWidth { bytes_per_index: usize },

    #[error("vertex buffer too short: need {needed} bytes, have {available}")]
    VertexBufferTooShort { needed: usize, available: usize },

    #[error("index buffer too short: need {needed} bytes, have {available}")]
    IndexBufferTooShort { needed: usize, available: usize },

    #[error("triangle index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

/// Positions as handed over by the sensor service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawVertexBuffer {
    pub bytes: Vec<u8>,
    /// Byte offset of the first vertex.
    pub offset: usize,
    /// Distance in bytes between consecutive vertices.
    pub stride: usize,
    pub count: usize,
}

impl RawVertexBuffer {
    pub fn new(bytes: Vec<u8>, stride: usize, count: usize) -> Self {
        Self {
            bytes,
            offset: 0,
            stride,
            count,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Bytes needed to read every vertex (the last one needs no padding).
    ///
    /// `None` if the size overflows `usize`.
    pub fn required_len(&self) -> Option<usize> {
        if self.count == 0 {
            return Some(self.offset);
        }
        (self.count - 1)
            .checked_mul(self.stride)?
            .checked_add(VERTEX_SIZE)?
            .checked_add(self.offset)
    }
}

/// Triangle indices as handed over by the sensor service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawIndexBuffer {
    pub bytes: Vec<u8>,
    /// Byte offset of the first primitive.
    pub offset: usize,
    /// Index width: 2 (`u16`) or 4 (`u32`).
    pub bytes_per_index: usize,
    pub indices_per_primitive: usize,
    pub primitive_count: usize,
}

impl RawIndexBuffer {
    pub fn new(
        bytes: Vec<u8>,
        bytes_per_index: usize,
        indices_per_primitive: usize,
        primitive_count: usize,
    ) -> Self {
        Self {
            bytes,
            offset: 0,
            bytes_per_index,
            indices_per_primitive,
            primitive_count,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Size of one primitive in bytes.
    pub fn primitive_size(&self) -> Option<usize> {
        self.bytes_per_index.checked_mul(self.indices_per_primitive)
    }

    /// Bytes needed to read every primitive. `None` on overflow.
    pub fn required_len(&self) -> Option<usize> {
        self.primitive_size()?
            .checked_mul(self.primitive_count)?
            .checked_add(self.offset)
    }
}

/// Decode the positions of a vertex buffer.
pub fn decode_vertices(buffer: &RawVertexBuffer) -> Result<Vec<Vec3>, DecodeSkipped> {
    if buffer.count == 0 {
        return Err(DecodeSkipped::NoVertices);
    }

    let available = buffer.bytes.len();
    let needed = buffer.required_len().unwrap_or(usize::MAX);
    if needed > available {
        return Err(DecodeSkipped::VertexBufferTooShort { needed, available });
    }

    let vertices = (0..buffer.count)
        .map(|i| {
            let start = buffer.offset + i * buffer.stride;
            let xyz: [f32; 3] = pod_read_unaligned(&buffer.bytes[start..start + VERTEX_SIZE]);
            Vec3::from_array(xyz)
        })
        .collect();
    Ok(vertices)
}

/// Decode the triangles of an index buffer, widening indices to `u32`.
///
/// Only triangle lists are accepted; any other primitive size yields no
/// faces at all.
pub fn decode_triangles(buffer: &RawIndexBuffer) -> Result<Vec<[u32; 3]>, DecodeSkipped> {
    if buffer.primitive_count == 0 {
        return Err(DecodeSkipped::NoFaces);
    }
    if buffer.indices_per_primitive != 3 {
        return Err(DecodeSkipped::UnsupportedTopology {
            indices_per_primitive: buffer.indices_per_primitive,
        });
    }

    let read_index: fn(&[u8]) -> u32 = match buffer.bytes_per_index {
        2 => |b: &[u8]| u32::from(pod_read_unaligned::<u16>(b)),
        4 => |b: &[u8]| pod_read_unaligned::<u32>(b),
        bytes_per_index => {
            return Err(DecodeSkipped::UnsupportedIndexWidth { bytes_per_index });
        }
    };

    let available = buffer.bytes.len();
    let needed = buffer.required_len().unwrap_or(usize::MAX);
    if needed > available {
        return Err(DecodeSkipped::IndexBufferTooShort { needed, available });
    }

    let width = buffer.bytes_per_index;
    let primitive_size = width * 3;
    let triangles = (0..buffer.primitive_count)
        .map(|p| {
            let base = buffer.offset + p * primitive_size;
            std::array::from_fn(|k| {
                let at = base + k * width;
                read_index(&buffer.bytes[at..at + width])
            })
        })
        .collect();
    Ok(triangles)
}

/// Decode one anchor's buffers into a [`LocalMesh`].
///
/// An index referring past the vertex list rejects the whole anchor.
pub fn decode_local_mesh(
    vertices: &RawVertexBuffer,
    faces: &RawIndexBuffer,
) -> Result<LocalMesh, DecodeSkipped> {
    let vertices = decode_vertices(vertices)?;
    let triangles = decode_triangles(faces)?;
    LocalMesh::new(vertices, triangles)
}

/// Pack positions into a raw buffer with the given stride.
///
/// Strides below [`VERTEX_SIZE`] are raised to it; padding bytes are zero.
pub fn encode_vertex_buffer(positions: &[Vec3], stride: usize) -> RawVertexBuffer {
    let stride = stride.max(VERTEX_SIZE);
    let mut bytes = vec![0u8; positions.len() * stride];
    for (chunk, position) in bytes.chunks_exact_mut(stride).zip(positions) {
        chunk[..VERTEX_SIZE].copy_from_slice(bytemuck::bytes_of(&position.to_array()));
    }
    RawVertexBuffer::new(bytes, stride, positions.len())
}

/// Pack triangles into a raw index buffer of the given width.
///
/// Returns `None` for widths other than 2 and 4, or when an index does not
/// fit in 16 bits.
pub fn encode_index_buffer(triangles: &[[u32; 3]], bytes_per_index: usize) -> Option<RawIndexBuffer> {
    let indices = triangles.iter().flatten().copied();
    let bytes: Vec<u8> = match bytes_per_index {
        2 => {
            let narrow = indices
                .map(|i| u16::try_from(i).ok())
                .collect::<Option<Vec<u16>>>()?;
            bytemuck::cast_slice(&narrow).to_vec()
        }
        4 => {
            let wide: Vec<u32> = indices.collect();
            bytemuck::cast_slice(&wide).to_vec()
        }
        _ => return None,
    };
    Some(RawIndexBuffer::new(bytes, bytes_per_index, 3, triangles.len()))
}
