//! Errors surfaced by a scan session.

use std::io;

/// A failure that ends the current scan.
///
/// Every variant is shown to the user through the session status; per-anchor
/// decode problems are not errors and never appear here.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("LiDAR mesh reconstruction is not supported on this device")]
    CapabilityUnsupported,

    #[error("Sensor failed to start: {0}")]
    SensorStart(String),

    #[error("No mesh data captured")]
    EmptyCapture,

    #[error("{context}: {source}")]
    ExportIo {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Scan session is no longer running")]
    SessionClosed,
}

impl ScanError {
    pub(crate) fn export_io(context: impl Into<String>, source: io::Error) -> Self {
        Self::ExportIo {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_user_facing() {
        assert_eq!(ScanError::EmptyCapture.to_string(), "No mesh data captured");

        let err = ScanError::export_io(
            "creating /scans",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "creating /scans: denied");
        assert!(std::error::Error::source(&err).is_some());
    }
}
