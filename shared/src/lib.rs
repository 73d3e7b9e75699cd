//! Shared types for the MeshScan capture pipeline.
//!
//! Used by `meshscan-common` (buffer decoding, file formats),
//! `meshscan-core` (session runtime) and `meshscan-export` (tooling).

pub mod fs;
pub mod ids;
pub mod scan_format;
pub mod state;

pub use ids::{AnchorId, ParseAnchorIdError};
pub use scan_format::{SCAN_FORMAT, ScanFormat};
pub use state::ScanState;
