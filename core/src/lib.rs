//! MeshScan Core - depth-sensor scan accumulation and export
//!
//! Turns a stream of per-anchor mesh updates from a scene-reconstruction
//! sensor into one merged mesh, shows it live, and writes it out as OBJ/MTL.
//!
//! # Architecture
//!
//! - [`ScanSession`] - Session thread owning all scan state, driven through [`ScanHandle`]
//! - [`MeshCache`] - Latest world-space mesh per anchor
//! - [`UpdateThrottle`] - Bounds how often anchor batches are processed
//! - [`LiveMeshProjector`] - Keeps renderer scene nodes in step with the cache
//! - [`export_snapshot`] - Merges a cache snapshot into OBJ/MTL files
//! - [`SensorService`] / [`RenderSink`] - Boundaries to the platform

pub mod cache;
pub mod config;
pub mod error;
pub mod export;
#[cfg(test)]
mod integration;
pub mod projector;
pub mod sensor;
pub mod session;
#[cfg(test)]
pub mod test_utils;
pub mod throttle;

pub use cache::{CacheSnapshot, MeshCache};
pub use config::Config;
pub use error::ScanError;
pub use export::{ExportOptions, ExportedModel, default_scans_dir, export_snapshot};
pub use projector::{LiveMaterial, LiveMeshProjector, Projection, RenderHandle, RenderMesh};
pub use sensor::{
    AnchorBatch, BatchKind, ReconstructionMode, ReconstructionSupport, RenderSink, SensorService,
};
pub use session::{SavedScan, ScanHandle, ScanSession, ScanStatus, SessionOptions};
pub use throttle::{DEFAULT_MIN_INTERVAL, UpdateThrottle};

// Re-export shared pipeline types for convenience
pub use meshscan_common::{AnchorUpdate, DecodeSkipped, RawIndexBuffer, RawVertexBuffer, WorldMesh};
pub use meshscan_shared::{AnchorId, ScanState};
