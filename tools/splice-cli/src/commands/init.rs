//! Initialize a new Splice project.

use std::path::{Path, PathBuf};

use anyhow::Context;
use splice_editing_core::{Editor, EditorSettings};
use splice_project_model::{Clip, LoadedProject, SourceRef, Timeline, TrackKind};

/// Length of a WAV file in seconds.
fn wav_duration(path: &Path) -> anyhow::Result<f64> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to read WAV header of {}", path.display()))?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate.max(1) as f64)
}

pub fn run(name: String, output: PathBuf, imports: Vec<PathBuf>, bpm: Option<f64>) -> anyhow::Result<()> {
    let project_dir = output.join(&name);
    println!("Creating project '{}' at {}", name, project_dir.display());

    let mut timeline = Timeline::new();
    if let Some(bpm) = bpm.filter(|b| b.is_finite() && *b > 0.0) {
        timeline.bpm = bpm;
    }
    let mut project = LoadedProject::create(&project_dir, &name, timeline)
        .map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))?;

    if !imports.is_empty() {
        let mut editor = Editor::new(project.timeline.clone(), EditorSettings::default());
        let track = editor.add_track(TrackKind::Audio, "");
        let mut cursor = 0.0;

        for source in &imports {
            let file_name = source
                .file_name()
                .with_context(|| format!("Not a file: {}", source.display()))?;
            let duration = wav_duration(source)?;
            let target = project_dir.join("sources").join(file_name);
            std::fs::copy(source, &target)
                .with_context(|| format!("Failed to copy {} into sources/", source.display()))?;

            let source_ref = SourceRef::new(format!("sources/{}", file_name.to_string_lossy()));
            let clip = Clip::audio(source_ref, cursor, duration, duration);
            let clip_id = editor.add_clip(track, clip)?;
            tracing::info!(clip = %clip_id, source = %source.display(), duration, "Imported source");
            println!("  Imported {} ({duration:.2}s) as clip {clip_id}", source.display());
            cursor += duration;
        }

        project.timeline = editor.into_timeline();
        project.project.touch();
        project
            .save()
            .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))?;
    }

    println!("Project created successfully:");
    println!("  Directory: {}", project.root.display());
    println!("  Tempo: {} BPM", project.timeline.bpm);
    println!("  Clips: {}", project.timeline.clip_count());
    println!();
    println!("Directory structure:");
    println!("  {}/", name);
    println!("  ├── sources/     (imported media)");
    println!("  ├── meta/        (project.json, timeline.json)");
    println!("  ├── cache/       (decoded media)");
    println!("  └── exports/     (rendered output)");

    Ok(())
}
