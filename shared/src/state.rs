//! Lifecycle states of a scan session.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a scan session is in its lifecycle.
///
/// ```text
/// Idle ──start──▶ Preparing ──▶ Scanning ──stop──▶ Finishing ──▶ Saved
///                     │                                 │
///                     └──────────────▶ Error ◀──────────┘
/// ```
///
/// `Idle`, `Saved` and `Error` accept a new scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    #[default]
    Idle,
    Preparing,
    Scanning,
    Finishing,
    Saved,
    Error,
}

impl ScanState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Scanning => "scanning",
            Self::Finishing => "finishing",
            Self::Saved => "saved",
            Self::Error => "error",
        }
    }

    /// Whether a new scan may be started from this state.
    pub const fn accepts_start(self) -> bool {
        matches!(self, Self::Idle | Self::Saved | Self::Error)
    }

    /// Terminal states of one scan (the session itself keeps running).
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Saved | Self::Error)
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
