//! Configuration management (config.toml)
//!
//! Handles loading, saving, and providing defaults for session settings.
//! Settings are stored in TOML format in the platform-specific config directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::throttle::DEFAULT_MIN_INTERVAL;

/// Session configuration.
///
/// Serialized to/from TOML; every section and field may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Anchor update rate limiting
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// Session thread settings
    #[serde(default)]
    pub session: SessionConfig,
    /// OBJ/MTL output settings
    #[serde(default)]
    pub export: ExportConfig,
}

/// Anchor update rate limiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Minimum spacing between processed batches (default: 83 ms, ≈12 Hz)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

/// Session thread settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inbound event queue depth; events beyond it are dropped (default: 64)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Window over which the update rate is measured (default: 1000 ms)
    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: u64,
}

/// OBJ/MTL output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output directory (default: `<data dir>/scans`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Object name written after `o` (default: scan_mesh)
    #[serde(default = "default_object_name")]
    pub object_name: String,
    /// Material name in both files (default: scanMaterial)
    #[serde(default = "default_material_name")]
    pub material_name: String,
}

fn default_min_interval_ms() -> u64 {
    DEFAULT_MIN_INTERVAL.as_millis() as u64
}

fn default_channel_capacity() -> usize {
    64
}

fn default_rate_window_ms() -> u64 {
    1000
}

fn default_object_name() -> String {
    meshscan_shared::SCAN_FORMAT.object_name.to_string()
}

fn default_material_name() -> String {
    meshscan_shared::SCAN_FORMAT.material_name.to_string()
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            rate_window_ms: default_rate_window_ms(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            object_name: default_object_name(),
            material_name: default_material_name(),
        }
    }
}

impl ThrottleConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl SessionConfig {
    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\MeshScan\config`
/// On macOS: `~/Library/Application Support/io.meshscan.MeshScan`
/// On Linux: `~/.config/meshscan`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.meshscan", "", "MeshScan")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the platform-specific data directory.
///
/// Exported scans live in its `scans` subdirectory unless configured otherwise.
/// Returns `None` if the home directory cannot be determined.
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.meshscan", "", "MeshScan")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Returns the path of `config.toml` in the platform configuration directory.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Loads the configuration from disk.
///
/// Reads [`config_path`]. Returns default values if the file doesn't exist
/// or cannot be parsed.
pub fn load() -> Config {
    config_path()
        .map(|path| load_from(&path))
        .unwrap_or_default()
}

/// Loads the configuration from an explicit file, falling back to defaults.
pub fn load_from(path: &Path) -> Config {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
            Config::default()
        }
    }
}

/// Saves the configuration to `path`, creating its directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file
/// cannot be written.
pub fn save_to(config: &Config, path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let content = toml::to_string_pretty(config).map_err(std::io::Error::other)?;
    std::fs::write(path, content)
}

/// Check settings that parse but cannot work as intended.
///
/// Returns a list of warning messages; an empty list means the config is sane.
pub fn validate(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.session.channel_capacity == 0 {
        warnings.push("session.channel_capacity is 0; using 1".to_string());
    }
    if config.session.rate_window_ms == 0 {
        warnings.push("session.rate_window_ms is 0; the update rate will not be reported".to_string());
    }

    let names = [
        (&config.export.object_name, "export.object_name"),
        (&config.export.material_name, "export.material_name"),
    ];
    for (value, name) in names {
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            warnings.push(format!(
                "{} '{}' must be a single non-empty word for OBJ readers",
                name, value
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================================
    // Default value tests
    // =============================================================

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.throttle.min_interval(), Duration::from_millis(83));
        assert_eq!(config.session.channel_capacity, 64);
        assert_eq!(config.session.rate_window(), Duration::from_secs(1));
        assert_eq!(config.export.output_dir, None);
        assert_eq!(config.export.object_name, "scan_mesh");
        assert_eq!(config.export.material_name, "scanMaterial");
    }

    // =============================================================
    // Serialization tests
    // =============================================================

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.throttle.min_interval_ms = 50;
        config.export.output_dir = Some(PathBuf::from("/data/scans"));

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
[throttle]
min_interval_ms = 200

[export]
object_name = "kitchen"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.throttle.min_interval_ms, 200);
        assert_eq!(config.export.object_name, "kitchen");
        // untouched fields keep their defaults
        assert_eq!(config.export.material_name, "scanMaterial");
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_default_output_dir_is_not_serialized() {
        let toml_str = toml::to_string(&Config::default()).unwrap();
        assert!(!toml_str.contains("output_dir"));
        assert!(toml_str.contains("min_interval_ms = 83"));
    }

    // =============================================================
    // File tests
    // =============================================================

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.session.channel_capacity = 8;
        save_to(&config, &path).unwrap();

        assert_eq!(load_from(&path), config);
    }

    #[test]
    fn test_config_path_is_in_config_dir() {
        if let Some(dir) = config_dir() {
            assert_eq!(config_path(), Some(dir.join("config.toml")));
        }
    }

    #[test]
    fn test_missing_or_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(load_from(&path), Config::default());

        std::fs::write(&path, "throttle = [not valid").unwrap();
        assert_eq!(load_from(&path), Config::default());
    }

    // =============================================================
    // Validation tests
    // =============================================================

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_empty());
    }

    #[test]
    fn test_validate_flags_unusable_values() {
        let mut config = Config::default();
        config.session.channel_capacity = 0;
        config.export.material_name = "scan material".into();

        let warnings = validate(&config);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("channel_capacity"));
        assert!(warnings[1].contains("export.material_name"));
    }
}
