//! meshscan-export library
//!
//! Replays recorded sensor captures through a headless scan session so the
//! accumulation and export pipeline runs without sensor hardware.

pub mod replay;
pub mod summary;
pub mod synth;

pub use replay::{
    CountingSink, DEFAULT_EXPORT_TIMEOUT, RenderStats, ReplayOptions, ReplayReport, ReplaySensor,
    replay_capture,
};
pub use summary::{CaptureSummary, anchor_history};

// Re-export the capture format so callers need only this crate
pub use meshscan_common::formats::{CaptureEvent, CaptureRecord, load_capture, save_capture};
