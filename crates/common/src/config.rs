//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where projects are stored.
    pub projects_dir: PathBuf,

    /// Default render/export settings.
    #[serde(default)]
    pub render: RenderDefaults,

    /// Editor interaction and history settings.
    #[serde(default)]
    pub editor: EditorDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Mixdown sample rate (Hz).
    pub sample_rate: u32,

    /// Mixdown channel count.
    pub channels: u16,

    /// Silence appended after the last clip so release tails are not cut.
    pub tail_secs: f64,

    /// Frames processed between cancellation checks.
    pub block_size: usize,

    /// Default video frame rate.
    pub fps: u32,

    /// Default video output size.
    pub width: u32,
    pub height: u32,

    /// Default tempo used for beat-synced transition durations.
    pub bpm: f64,
}

/// Editor behaviour defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorDefaults {
    /// Maximum number of history snapshots kept (0 = unbounded).
    pub history_capacity: usize,

    /// Distance in seconds within which a moved clip snaps flush to a neighbor.
    pub snap_tolerance_secs: f64,

    /// Pixel tolerance used when hit-testing drag handles.
    pub handle_tolerance_px: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "splice=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            projects_dir: dirs_default_projects(),
            render: RenderDefaults::default(),
            editor: EditorDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            tail_secs: 1.0,
            block_size: 1024,
            fps: 30,
            width: 1280,
            height: 720,
            bpm: 120.0,
        }
    }
}

impl Default for EditorDefaults {
    fn default() -> Self {
        Self {
            history_capacity: 200,
            snap_tolerance_secs: 0.1,
            handle_tolerance_px: 10.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("splice").join("config.json")
}

/// Default projects directory.
fn dirs_default_projects() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("splice").join("projects")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.render.sample_rate = 48_000;
        config.editor.history_capacity = 16;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.render.sample_rate, 48_000);
        assert_eq!(loaded.editor.history_capacity, 16);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"projects_dir":"/srv/splice"}"#).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.projects_dir, PathBuf::from("/srv/splice"));
        assert_eq!(loaded.render.channels, 2);
        assert!((loaded.editor.snap_tolerance_secs - 0.1).abs() < 1e-12);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.render.block_size, 1024);
    }
}
