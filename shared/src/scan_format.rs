//! Naming constants for MeshScan output and capture files.
//!
//! `ScanFormat` is the single source of truth for file extensions, the
//! capture-recording magic bytes and the fixed names written into exported
//! geometry.
//!
//! # Example
//!
//! ```
//! use meshscan_shared::SCAN_FORMAT;
//!
//! assert_eq!(SCAN_FORMAT.geometry_ext, "obj");
//! assert_eq!(SCAN_FORMAT.capture_magic, b"MSCP");
//! ```

/// Naming constants for scan output and capture recordings.
#[derive(Debug, Clone, Copy)]
pub struct ScanFormat {
    /// Prefix of exported file names (`scan_<timestamp>.obj`)
    pub file_prefix: &'static str,

    /// Geometry file extension without dot
    pub geometry_ext: &'static str,

    /// Material file extension without dot
    pub material_ext: &'static str,

    /// Capture recording extension without dot
    pub capture_ext: &'static str,

    /// Magic bytes at start of a capture recording (4 bytes)
    pub capture_magic: &'static [u8; 4],

    /// Capture recording version
    pub capture_version: u16,

    /// Name of the single object in exported geometry
    pub object_name: &'static str,

    /// Name of the single material in exported geometry
    pub material_name: &'static str,

    /// Directory name for exported scans under the data directory
    pub scans_dir: &'static str,
}

impl ScanFormat {
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        file_prefix: &'static str,
        geometry_ext: &'static str,
        material_ext: &'static str,
        capture_ext: &'static str,
        capture_magic: &'static [u8; 4],
        capture_version: u16,
        object_name: &'static str,
        material_name: &'static str,
        scans_dir: &'static str,
    ) -> Self {
        Self {
            file_prefix,
            geometry_ext,
            material_ext,
            capture_ext,
            capture_magic,
            capture_version,
            object_name,
            material_name,
            scans_dir,
        }
    }
}

/// MeshScan file naming constants.
pub const SCAN_FORMAT: ScanFormat = ScanFormat::new(
    "scan",
    "obj",
    "mtl",
    "mscap",
    b"MSCP",
    1,
    "scan_mesh",
    "scanMaterial",
    "scans",
);
