//! MeshScan file formats
//!
//! - [`obj`] - Wavefront OBJ/MTL text output for exported scans
//! - [`capture`] - Binary recording of sensor events (`.mscap`) for offline replay
//!
//! Extensions and magic bytes are defined in `meshscan_shared::ScanFormat`.

pub mod capture;
pub mod obj;

pub use capture::*;
pub use obj::*;

pub use meshscan_shared::{SCAN_FORMAT, ScanFormat};
