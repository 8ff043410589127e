//! Project metadata and configuration types.
//!
//! A project is the top-level container that ties together source media,
//! the editing timeline, and export configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clip::ClipPayload;
use crate::timeline::Timeline;

fn default_project_version() -> String {
    "1.0".to_string()
}

/// Top-level project file (`project.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Informational record-format marker. Loading never checks it and no
    /// migration is keyed on it.
    #[serde(default = "default_project_version")]
    pub version: String,

    /// Human-readable project name.
    pub name: String,

    /// Unique project identifier (UUID).
    pub id: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    /// Export configuration.
    pub export: ExportConfig,
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output format.
    pub format: ExportFormat,

    /// Mixdown sample rate (Hz).
    pub sample_rate: u32,

    /// Mixdown channel count.
    pub channels: u16,

    /// Output resolution (width x height in pixels).
    pub width: u32,
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// Master gain applied after every track.
    #[serde(default = "default_master_gain")]
    pub master_gain: f64,
}

fn default_master_gain() -> f64 {
    1.0
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Wav,
            sample_rate: 44_100,
            channels: 2,
            width: 1280,
            height: 720,
            fps: 30,
            master_gain: 1.0,
        }
    }
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// 16-bit PCM audio mixdown only.
    Wav,
    #[serde(rename = "mp4-h264")]
    Mp4H264,
    Webm,
}

impl ExportFormat {
    /// Whether this format carries video frames.
    pub fn has_video(self) -> bool {
        !matches!(self, ExportFormat::Wav)
    }

    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp4H264 => "mp4",
            ExportFormat::Webm => "webm",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ProjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wav" => Ok(ExportFormat::Wav),
            "mp4" | "mp4-h264" => Ok(ExportFormat::Mp4H264),
            "webm" => Ok(ExportFormat::Webm),
            other => Err(ProjectError::ValidationError {
                message: format!("Unknown export format: {other}. Use: wav, mp4-h264, webm"),
            }),
        }
    }
}

/// The complete in-memory representation of a loaded project.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Filesystem path to the project directory.
    pub root: PathBuf,

    /// Project metadata.
    pub project: Project,

    /// Editing timeline.
    pub timeline: Timeline,
}

impl Project {
    /// Create a new project with defaults.
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: default_project_version(),
            name: name.into(),
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now.clone(),
            modified_at: now,
            export: ExportConfig::default(),
        }
    }

    /// Update the modification timestamp.
    pub fn touch(&mut self) {
        self.modified_at = chrono::Utc::now().to_rfc3339();
    }
}

impl LoadedProject {
    /// Load a project from a directory.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();

        let project_path = root.join("meta").join("project.json");
        let timeline_path = root.join("meta").join("timeline.json");

        let project_json =
            std::fs::read_to_string(&project_path).map_err(|e| ProjectError::IoError {
                path: project_path.clone(),
                source: e,
            })?;

        let project: Project =
            serde_json::from_str(&project_json).map_err(|e| ProjectError::ParseError {
                path: project_path,
                source: e,
            })?;

        let timeline = if timeline_path.exists() {
            let timeline_json =
                std::fs::read_to_string(&timeline_path).map_err(|e| ProjectError::IoError {
                    path: timeline_path.clone(),
                    source: e,
                })?;
            serde_json::from_str(&timeline_json).map_err(|e| ProjectError::ParseError {
                path: timeline_path,
                source: e,
            })?
        } else {
            Timeline::new()
        };

        Ok(Self {
            root,
            project,
            timeline,
        })
    }

    /// Save project and timeline to disk.
    pub fn save(&self) -> Result<(), ProjectError> {
        let meta_dir = self.root.join("meta");
        std::fs::create_dir_all(&meta_dir).map_err(|e| ProjectError::IoError {
            path: meta_dir.clone(),
            source: e,
        })?;

        let project_path = meta_dir.join("project.json");
        let project_json =
            serde_json::to_string_pretty(&self.project).map_err(|e| ProjectError::ParseError {
                path: project_path.clone(),
                source: e,
            })?;
        std::fs::write(&project_path, project_json).map_err(|e| ProjectError::IoError {
            path: project_path,
            source: e,
        })?;

        let timeline_path = meta_dir.join("timeline.json");
        let timeline_json =
            serde_json::to_string_pretty(&self.timeline).map_err(|e| ProjectError::ParseError {
                path: timeline_path.clone(),
                source: e,
            })?;
        std::fs::write(&timeline_path, timeline_json).map_err(|e| ProjectError::IoError {
            path: timeline_path,
            source: e,
        })?;

        Ok(())
    }

    /// Create a new project on disk with the standard directory structure.
    pub fn create(
        root: impl AsRef<Path>,
        name: impl Into<String>,
        timeline: Timeline,
    ) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();

        for subdir in &["sources", "meta", "cache", "exports"] {
            std::fs::create_dir_all(root.join(subdir)).map_err(|e| ProjectError::IoError {
                path: root.join(subdir),
                source: e,
            })?;
        }

        let loaded = Self {
            root,
            project: Project::new(name),
            timeline,
        };
        loaded.save()?;
        Ok(loaded)
    }

    /// Resolve a source reference against the project root.
    pub fn source_path(&self, source: &str) -> PathBuf {
        let path = Path::new(source);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Validate that all referenced source files exist and that the
    /// timeline invariants hold.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = self.timeline.validate();

        for track in &self.timeline.tracks {
            for clip in &track.clips {
                let (label, source) = match &clip.payload {
                    ClipPayload::Audio { source } => ("Audio", source),
                    ClipPayload::Video { source, .. } => ("Video", source),
                    ClipPayload::Instrument { .. }
                    | ClipPayload::Text { .. }
                    | ClipPayload::Sticker { .. } => continue,
                };
                if !self.source_path(source.as_str()).exists() {
                    errors.push(format!("{label} source missing: {source}"));
                }
            }
        }

        errors
    }
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}
