//! Render a project to WAV or video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use splice_common::config::AppConfig;
use splice_project_model::{ExportFormat, LoadedProject};
use splice_render_engine::{
    export_project, CancelToken, ExportJob, ExportKind, ExportProgress, MediaCache, ProgressCallback,
    WavFileDecoder,
};

pub async fn run(
    path: PathBuf,
    output: Option<PathBuf>,
    format: Option<String>,
    sample_rate: Option<u32>,
    duration: Option<f64>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    println!("Exporting project at: {}", path.display());

    let mut project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    if let Some(format) = format {
        project.project.export.format = format.parse::<ExportFormat>()?;
    }
    if let Some(rate) = sample_rate {
        project.project.export.sample_rate = rate;
    }

    let issues = project.timeline.validate();
    if !issues.is_empty() {
        anyhow::bail!("Timeline is inconsistent:\n  - {}", issues.join("\n  - "));
    }

    let output_path = output.unwrap_or_else(|| ExportJob::default_output_path(&project));
    let mut job = ExportJob::from_project(&project, &output_path, &config.render);
    job.mixdown.duration = duration;

    println!("  Output: {}", output_path.display());
    println!("  Format: {:?}", project.project.export.format);
    println!(
        "  Audio: {} Hz, {} channel(s)",
        job.mixdown.sample_rate, job.mixdown.channels
    );
    if let ExportKind::Video { .. } = job.kind {
        println!(
            "  Video: {}x{} @ {}fps",
            job.video.width, job.video.height, job.video.fps
        );
    }

    let cancel = CancelToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling export");
            on_ctrl_c.cancel();
        }
    });

    let progress_cb: ProgressCallback = Arc::new(|p: ExportProgress| {
        print!("\r  Progress: {:5.1}% ({:?})          ", p.progress * 100.0, p.stage);
        std::io::stdout().flush().ok();
    });

    let cache = Arc::new(MediaCache::new(WavFileDecoder::new(&project.root)));
    let snapshot = Arc::new(project.timeline);

    match export_project(job, snapshot, cache, cancel, Some(progress_cb)).await {
        Ok(outcome) => {
            println!("\nExport complete: {}", outcome.path.display());
            println!(
                "  Length: {:.2}s ({} frames)",
                outcome.audio.duration_secs, outcome.audio.frames
            );
            if let Some(frames) = outcome.video_frames {
                println!("  Video frames: {frames}");
            }
            for invalid in &outcome.audio.invalid_clips {
                println!("  Skipped clip {}: {}", invalid.clip_id, invalid.reason);
            }
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("\nExport cancelled. No file was written.");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Export failed: {e}")),
    }
}
