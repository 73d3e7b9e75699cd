//! Integration tests for meshscan-export
//!
//! Tests the full pipeline: write capture -> replay -> verify OBJ/MTL output

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use meshscan_core::{Config, config};
use meshscan_export::{load_capture, save_capture, synth};
use tempfile::tempdir;

/// Synthesized room -> replay -> OBJ with the surviving anchors
#[test]
fn test_synth_then_replay() {
    let dir = tempdir().expect("Failed to create temp dir");
    let capture = dir.path().join("room.mscap");
    let out_dir = dir.path().join("scans");

    let output = run(&["synth", path_str(&capture)]);
    assert!(output.status.success(), "synth command failed");
    assert!(capture.exists(), "Capture file should exist");

    let obj_path = replay(&capture, &out_dir, dir.path());
    assert!(obj_path.starts_with(&out_dir), "OBJ should land in {:?}", out_dir);

    let obj = std::fs::read_to_string(&obj_path).expect("Failed to read OBJ");
    verify_obj(&obj, 73, 86);

    let mtl_path = obj_path.with_extension("mtl");
    let mtl = std::fs::read_to_string(&mtl_path).expect("Failed to read MTL");
    assert!(mtl.contains("newmtl scanMaterial"));
    assert!(obj.contains(&format!(
        "mtllib {}",
        mtl_path.file_name().unwrap().to_str().unwrap()
    )));
}

/// Synth appends the capture extension when none is given
#[test]
fn test_synth_adds_extension() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output = run(&["synth", path_str(&dir.path().join("room"))]);
    assert!(output.status.success(), "synth command failed");
    assert!(dir.path().join("room.mscap").exists());
}

/// Info reports totals without touching the session
#[test]
fn test_info_prints_totals() {
    let dir = tempdir().expect("Failed to create temp dir");
    let capture = dir.path().join("room.mscap");
    save_capture(&capture, &synth::demo_room()).expect("Failed to write capture");

    let output = run(&["info", path_str(&capture)]);
    assert!(output.status.success(), "info command failed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("records:   7 (3 added, 3 updated, 1 removed)"), "{}", stdout);
    assert!(stdout.contains("5 unique"), "{}", stdout);
}

/// Info narrows the totals to one anchor's records
#[test]
fn test_info_for_one_anchor() {
    let dir = tempdir().expect("Failed to create temp dir");
    let capture = dir.path().join("room.mscap");
    save_capture(&capture, &synth::demo_room()).expect("Failed to write capture");

    let table = synth::TABLE.to_string();
    let output = run(&["info", path_str(&capture), "--anchor", &table]);
    assert!(output.status.success(), "info --anchor failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("records:   2 (1 added, 0 updated, 1 removed)"), "{}", stdout);
    assert!(stdout.contains("1 unique"), "{}", stdout);

    let output = run(&["info", path_str(&capture), "--anchor", "not-a-uuid"]);
    assert!(!output.status.success(), "A malformed anchor id should be rejected");
}

/// init-config writes the defaults once and refuses to clobber them
#[test]
fn test_init_config() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("meshscan").join("config.toml");

    let output = run(&["init-config", path_str(&path)]);
    assert!(output.status.success(), "init-config failed");
    assert_eq!(config::load_from(&path), Config::default());

    let output = run(&["init-config", path_str(&path)]);
    assert!(!output.status.success(), "An existing config should be kept");

    let output = run(&["init-config", path_str(&path), "--force"]);
    assert!(output.status.success(), "init-config --force failed");
}

/// Written captures load back identically
#[test]
fn test_capture_file_round_trip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let capture = dir.path().join("room.mscap");
    let records = synth::demo_room();

    save_capture(&capture, &records).expect("Failed to write capture");
    assert_eq!(load_capture(&capture).expect("Failed to read capture"), records);
}

/// A capture with no geometry fails to export and writes nothing
#[test]
fn test_replay_empty_capture_fails() {
    let dir = tempdir().expect("Failed to create temp dir");
    let capture = dir.path().join("empty.mscap");
    let out_dir = dir.path().join("scans");
    save_capture(&capture, &[]).expect("Failed to write capture");

    let output = run(&[
        "replay",
        path_str(&capture),
        "-o",
        path_str(&out_dir),
        "--config",
        path_str(&dir.path().join("missing.toml")),
    ]);

    assert!(!output.status.success(), "Replay of an empty capture should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No mesh data captured"), "{}", stderr);
    assert!(!out_dir.exists(), "No scans directory should be created");
}

/// Corrupt captures are rejected
#[test]
fn test_replay_rejects_garbage() {
    let dir = tempdir().expect("Failed to create temp dir");
    let capture = dir.path().join("garbage.mscap");
    std::fs::write(&capture, b"not a capture").expect("Failed to write file");

    let output = run(&["info", path_str(&capture)]);
    assert!(!output.status.success(), "info should reject a bad capture");
}

// Helper to run meshscan-export replay and return the printed OBJ path
fn replay(capture: &Path, out_dir: &Path, config_dir: &Path) -> PathBuf {
    let output = run(&[
        "replay",
        path_str(capture),
        "-o",
        path_str(out_dir),
        "--config",
        path_str(&config_dir.join("missing.toml")),
    ]);
    assert!(
        output.status.success(),
        "meshscan-export replay failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).expect("Non UTF-8 output");
    PathBuf::from(stdout.trim())
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_meshscan-export"))
        .args(args)
        .output()
        .expect("Failed to run meshscan-export")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("Non UTF-8 temp path")
}

// Verify an OBJ has the expected geometry and valid 1-based faces
fn verify_obj(obj: &str, expected_vertices: usize, expected_faces: usize) {
    let vertices = obj.lines().filter(|l| l.starts_with("v ")).count();
    let faces: Vec<&str> = obj.lines().filter(|l| l.starts_with("f ")).collect();

    assert_eq!(vertices, expected_vertices, "Vertex count mismatch");
    assert_eq!(faces.len(), expected_faces, "Face count mismatch");

    for face in faces {
        let indices: Vec<usize> = face[2..]
            .split_whitespace()
            .map(|i| i.parse().expect("Face index should be an integer"))
            .collect();
        assert_eq!(indices.len(), 3, "Faces should be triangles: {}", face);
        assert!(
            indices.iter().all(|&i| (1..=expected_vertices).contains(&i)),
            "Face index out of range: {}",
            face
        );
    }

    println!("Verified OBJ: {} vertices, {} faces", vertices, expected_faces);
}
