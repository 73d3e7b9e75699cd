//! OBJ/MTL export of accumulated scan geometry.
//!
//! Runs on a background thread spawned by the session. Every anchor in the
//! snapshot is appended to a single OBJ object in snapshot order, with its
//! triangle indices rebased onto the merged vertex list.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use meshscan_common::formats::{MtlMaterial, ObjWriter};
use meshscan_shared::SCAN_FORMAT;
use meshscan_shared::fs::{temp_path_for, write_file_atomic};
use tracing::info;

use crate::cache::CacheSnapshot;
use crate::config::{self, ExportConfig};
use crate::error::ScanError;

/// Where and how a scan is written.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub object_name: String,
    pub material: MtlMaterial,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            object_name: SCAN_FORMAT.object_name.to_string(),
            material: MtlMaterial::scan(SCAN_FORMAT.material_name),
        }
    }

    /// Resolve the configured export settings.
    ///
    /// Without an explicit `output_dir` scans go to `<data dir>/scans`.
    pub fn from_config(config: &ExportConfig) -> Result<Self, ScanError> {
        let output_dir = match &config.output_dir {
            Some(dir) => dir.clone(),
            None => default_scans_dir().ok_or_else(|| {
                ScanError::export_io(
                    "locating the scans directory",
                    io::Error::new(io::ErrorKind::NotFound, "no home directory"),
                )
            })?,
        };
        Ok(Self {
            output_dir,
            object_name: config.object_name.clone(),
            material: MtlMaterial::scan(config.material_name.clone()),
        })
    }
}

/// Files produced by one successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedModel {
    pub obj_path: PathBuf,
    pub mtl_path: PathBuf,
    pub anchor_count: usize,
    pub vertex_count: u64,
    pub triangle_count: u64,
}

/// Default export location: `<data dir>/scans`.
pub fn default_scans_dir() -> Option<PathBuf> {
    config::data_dir().map(|dir| dir.join(SCAN_FORMAT.scans_dir))
}

/// Write `snapshot` as `scan_<yyyyMMdd_HHmmss>.obj` plus its `.mtl`.
pub fn export_snapshot(
    snapshot: &CacheSnapshot,
    options: &ExportOptions,
) -> Result<ExportedModel, ScanError> {
    export_snapshot_at(snapshot, options, Local::now())
}

/// [`export_snapshot`] with an explicit timestamp for the file names.
pub fn export_snapshot_at(
    snapshot: &CacheSnapshot,
    options: &ExportOptions,
    now: DateTime<Local>,
) -> Result<ExportedModel, ScanError> {
    if snapshot.is_empty() {
        return Err(ScanError::EmptyCapture);
    }

    let dir = &options.output_dir;
    fs::create_dir_all(dir)
        .map_err(|e| ScanError::export_io(format!("creating {}", dir.display()), e))?;

    let base = unique_base_name(dir, &timestamped_base_name(now));
    let obj_path = dir.join(format!("{base}.{}", SCAN_FORMAT.geometry_ext));
    let mtl_path = dir.join(format!("{base}.{}", SCAN_FORMAT.material_ext));
    let mtl_file = format!("{base}.{}", SCAN_FORMAT.material_ext);

    // Material first, so a finished OBJ never points at a missing library
    let mut mtl = Vec::new();
    options
        .material
        .write(&mut mtl)
        .and_then(|()| write_file_atomic(&mtl_path, &mtl))
        .map_err(|e| ScanError::export_io(format!("writing {}", mtl_path.display()), e))?;

    let (vertex_count, triangle_count) = write_obj(&obj_path, &mtl_file, snapshot, options)
        .map_err(|e| {
            let _ = fs::remove_file(&mtl_path);
            ScanError::export_io(format!("writing {}", obj_path.display()), e)
        })?;

    info!(
        "Scan exported: {} ({} anchors, {} vertices, {} triangles)",
        obj_path.display(),
        snapshot.len(),
        vertex_count,
        triangle_count
    );

    Ok(ExportedModel {
        obj_path,
        mtl_path,
        anchor_count: snapshot.len(),
        vertex_count,
        triangle_count,
    })
}

/// Stream the merged geometry into `path` via a scratch file and a rename.
fn write_obj(
    path: &Path,
    mtl_file: &str,
    snapshot: &CacheSnapshot,
    options: &ExportOptions,
) -> io::Result<(u64, u64)> {
    let temp = temp_path_for(path);
    let result = (|| {
        let file = File::create(&temp)?;
        let mut obj = ObjWriter::new(
            BufWriter::new(file),
            mtl_file,
            &options.object_name,
            &options.material.name,
        )?;
        for (_, mesh) in snapshot.iter() {
            obj.write_mesh(mesh.vertices(), mesh.triangles())?;
        }
        let counts = (obj.vertex_count(), obj.triangle_count());

        let file = obj.finish()?.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&temp, path)?;
        Ok(counts)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

/// `scan_<yyyyMMdd_HHmmss>` in local time.
fn timestamped_base_name(now: DateTime<Local>) -> String {
    format!("{}_{}", SCAN_FORMAT.file_prefix, now.format("%Y%m%d_%H%M%S"))
}

/// First of `base`, `base_1`, `base_2`, … with neither output file present.
fn unique_base_name(dir: &Path, base: &str) -> String {
    let taken = |name: &str| {
        [SCAN_FORMAT.geometry_ext, SCAN_FORMAT.material_ext]
            .iter()
            .any(|ext| dir.join(format!("{name}.{ext}")).exists())
    };

    if !taken(base) {
        return base.to_string();
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
