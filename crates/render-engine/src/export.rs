//! Export jobs: offline mixdown to WAV, or frames plus mixdown to a video
//! container.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use splice_common::config::RenderDefaults;
use splice_common::error::{SpliceError, SpliceResult};
use splice_project_model::{ExportFormat, LoadedProject, Timeline};

use crate::cache::MediaCache;
use crate::cancel::CancelToken;
use crate::mixdown::{render_mixdown_with_progress, MixdownConfig, RenderReport};
use crate::video::{render_video, FfmpegMuxer, FrameSink, VideoRenderConfig};
use crate::wav::{encode_wav, write_atomic};

/// What an export produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// 16-bit PCM WAV mixdown.
    Audio,
    /// Composited frames plus the mixdown in a video container.
    Video { format: ExportFormat },
}

impl From<ExportFormat> for ExportKind {
    fn from(format: ExportFormat) -> Self {
        if format.has_video() {
            ExportKind::Video { format }
        } else {
            ExportKind::Audio
        }
    }
}

/// An export job ready to be rendered.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Output file path.
    pub output_path: PathBuf,

    pub kind: ExportKind,

    /// Audio render settings.
    pub mixdown: MixdownConfig,

    /// Frame settings, used by video exports only.
    pub video: VideoRenderConfig,
}

impl ExportJob {
    /// Audio-only export with the given mixdown settings.
    pub fn audio(output_path: impl Into<PathBuf>, mixdown: MixdownConfig) -> Self {
        let defaults = RenderDefaults::default();
        Self {
            output_path: output_path.into(),
            kind: ExportKind::Audio,
            mixdown,
            video: VideoRenderConfig {
                width: defaults.width,
                height: defaults.height,
                fps: defaults.fps,
            },
        }
    }

    /// Job described by the project's export settings.
    pub fn from_project(
        project: &LoadedProject,
        output_path: impl Into<PathBuf>,
        defaults: &RenderDefaults,
    ) -> Self {
        let export = &project.project.export;
        Self {
            output_path: output_path.into(),
            kind: export.format.into(),
            mixdown: MixdownConfig::for_export(export, defaults),
            video: VideoRenderConfig::from_export(export),
        }
    }

    /// Default output location inside the project's `exports/` directory.
    pub fn default_output_path(project: &LoadedProject) -> PathBuf {
        let format = project.project.export.format;
        project
            .root
            .join("exports")
            .join(format!("{}.{}", sanitize_name(&project.project.name), format.extension()))
    }
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "export".to_string()
    } else {
        cleaned
    }
}

/// Progress callback for export rendering.
pub type ProgressCallback = Arc<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Preparing,
    Mixing,
    RenderingFrames,
    Encoding,
    Complete,
    Cancelled,
    Failed,
}

/// Result of a finished export.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub audio: RenderReport,
    /// Frames written, for video exports.
    pub video_frames: Option<u64>,
}

impl ExportOutcome {
    /// Number of clips left out of the audio or video render.
    pub fn invalid_clip_count(&self) -> usize {
        self.audio.invalid_clips.len()
    }
}

struct Reporter<'a>(Option<&'a ProgressCallback>);

impl Reporter<'_> {
    fn emit(&self, stage: ExportStage, progress: f64) {
        if let Some(cb) = self.0 {
            cb(ExportProgress {
                progress: progress.clamp(0.0, 1.0),
                stage,
            });
        }
    }

    fn fail(&self, err: &SpliceError) {
        let stage = if err.is_cancelled() {
            ExportStage::Cancelled
        } else {
            ExportStage::Failed
        };
        self.emit(stage, 0.0);
    }
}

/// Export a timeline snapshot.
///
/// Rendering runs on the blocking pool with a fresh graph. The output file
/// appears only once complete; a cancelled or failed export leaves nothing
/// at `job.output_path`.
pub async fn export_project(
    job: ExportJob,
    snapshot: Arc<Timeline>,
    cache: Arc<MediaCache>,
    cancel: CancelToken,
    progress: Option<ProgressCallback>,
) -> SpliceResult<ExportOutcome> {
    tracing::info!(
        output = %job.output_path.display(),
        kind = ?job.kind,
        "Starting export"
    );

    tokio::task::spawn_blocking(move || {
        export_blocking(&job, &snapshot, &cache, &cancel, progress.as_ref())
    })
    .await
    .map_err(|e| SpliceError::render(format!("Export task failed: {e}")))?
}

/// Blocking body of [`export_project`].
pub fn export_blocking(
    job: &ExportJob,
    snapshot: &Timeline,
    cache: &MediaCache,
    cancel: &CancelToken,
    progress: Option<&ProgressCallback>,
) -> SpliceResult<ExportOutcome> {
    match job.kind {
        ExportKind::Audio => run_audio(job, snapshot, cache, cancel, progress),
        ExportKind::Video { format } => {
            prepare_output_dir(job)?;
            let mut muxer = FfmpegMuxer::new(&job.output_path, format, job.video)?;
            export_video_to_sink(job, snapshot, cache, cancel, progress, &mut muxer)
        }
    }
}

fn prepare_output_dir(job: &ExportJob) -> SpliceResult<()> {
    if let Some(parent) = job.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn run_audio(
    job: &ExportJob,
    snapshot: &Timeline,
    cache: &MediaCache,
    cancel: &CancelToken,
    progress: Option<&ProgressCallback>,
) -> SpliceResult<ExportOutcome> {
    let reporter = Reporter(progress);
    let result = (|| -> SpliceResult<ExportOutcome> {
        reporter.emit(ExportStage::Preparing, 0.0);
        prepare_output_dir(job)?;

        let (mix, report) = render_mixdown_with_progress(snapshot, cache, &job.mixdown, cancel, &mut |p| {
            reporter.emit(ExportStage::Mixing, p * 0.95)
        })?;

        reporter.emit(ExportStage::Encoding, 0.95);
        let bytes = encode_wav(&mix);
        cancel.check()?;
        write_atomic(&job.output_path, &bytes)?;

        Ok(ExportOutcome {
            path: job.output_path.clone(),
            audio: report,
            video_frames: None,
        })
    })();

    finish(&reporter, result)
}

/// Video export into an arbitrary [`FrameSink`]. The sink is aborted on any
/// failure or cancellation.
pub fn export_video_to_sink(
    job: &ExportJob,
    snapshot: &Timeline,
    cache: &MediaCache,
    cancel: &CancelToken,
    progress: Option<&ProgressCallback>,
    sink: &mut dyn FrameSink,
) -> SpliceResult<ExportOutcome> {
    let reporter = Reporter(progress);
    let result = (|| -> SpliceResult<ExportOutcome> {
        reporter.emit(ExportStage::Preparing, 0.0);

        let (mix, mut report) = render_mixdown_with_progress(snapshot, cache, &job.mixdown, cancel, &mut |p| {
            reporter.emit(ExportStage::Mixing, p * 0.3)
        })?;

        let duration = job.mixdown.resolve_duration(snapshot);
        let video = render_video(snapshot, cache, job.video, duration, cancel, sink, &mut |p| {
            reporter.emit(ExportStage::RenderingFrames, 0.3 + p * 0.6)
        })?;
        report.invalid_clips.extend(video.invalid_clips);

        reporter.emit(ExportStage::Encoding, 0.9);
        cancel.check()?;
        sink.finish(&mix)?;

        Ok(ExportOutcome {
            path: job.output_path.clone(),
            audio: report,
            video_frames: Some(video.frames),
        })
    })();

    if result.is_err() {
        sink.abort();
    }
    finish(&reporter, result)
}

fn finish(reporter: &Reporter<'_>, result: SpliceResult<ExportOutcome>) -> SpliceResult<ExportOutcome> {
    match &result {
        Ok(outcome) => {
            reporter.emit(ExportStage::Complete, 1.0);
            tracing::info!(
                output = %outcome.path.display(),
                invalid_clips = outcome.invalid_clip_count(),
                "Export complete"
            );
        }
        Err(err) => {
            reporter.fail(err);
            if err.is_cancelled() {
                tracing::info!("Export cancelled");
            } else {
                tracing::error!(error = %err, "Export failed");
            }
        }
    }
    result
}
