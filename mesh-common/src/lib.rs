//! Mesh types and file formats for the MeshScan capture pipeline
//!
//! This crate is shared between:
//! - `meshscan-core` (session runtime)
//! - `meshscan-export` (replay and export tooling)
//!
//! # Modules
//!
//! - [`decode`] - Raw sensor vertex/index buffers → [`LocalMesh`]
//! - [`mesh`] - Local and world-frame triangle meshes
//! - [`anchor`] - One anchor's mesh update as delivered by the sensor
//! - [`formats`] - OBJ/MTL writers and the binary capture recording format

pub mod anchor;
pub mod decode;
pub mod formats;
pub mod mesh;

pub use anchor::AnchorUpdate;
pub use decode::{
    DecodeSkipped, RawIndexBuffer, RawVertexBuffer, VERTEX_SIZE, decode_local_mesh,
    decode_triangles, decode_vertices, encode_index_buffer, encode_vertex_buffer,
};
pub use mesh::{LocalMesh, WorldMesh};
