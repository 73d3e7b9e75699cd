//! UI-visible session status

use std::path::PathBuf;

use meshscan_shared::ScanState;

use crate::export::ExportedModel;
use crate::sensor::ReconstructionMode;

/// Everything a UI shows about the session.
///
/// Published by the session thread after every change; readers always see
/// a complete value.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStatus {
    pub state: ScanState,
    /// Anchors currently in the cache
    pub anchor_count: usize,
    /// Anchor meshes processed per second over the last rate window
    pub update_rate: f64,
    /// Most recent session log line
    pub last_log: String,
    /// Set while in `Error`; cleared by the next scan
    pub error_message: Option<String>,
    /// Output of the last successful export
    pub saved: Option<SavedScan>,
    /// Mode of the running or last scan
    pub mode: Option<ReconstructionMode>,
}

impl ScanStatus {
    pub fn can_start(&self) -> bool {
        self.state.accepts_start()
    }

    pub fn can_stop(&self) -> bool {
        self.state == ScanState::Scanning
    }
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self {
            state: ScanState::Idle,
            anchor_count: 0,
            update_rate: 0.0,
            last_log: "ready".to_string(),
            error_message: None,
            saved: None,
            mode: None,
        }
    }
}

/// Where a finished scan was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedScan {
    pub obj_path: PathBuf,
    pub mtl_path: PathBuf,
    pub vertex_count: u64,
    pub triangle_count: u64,
}

impl From<&ExportedModel> for SavedScan {
    fn from(model: &ExportedModel) -> Self {
        Self {
            obj_path: model.obj_path.clone(),
            mtl_path: model.mtl_path.clone(),
            vertex_count: model.vertex_count,
            triangle_count: model.triangle_count,
        }
    }
}
