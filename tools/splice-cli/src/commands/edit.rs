//! Timeline edits applied to a saved project.

use std::path::PathBuf;

use anyhow::Context;
use splice_common::config::AppConfig;
use splice_editing_core::{Editor, EditorSettings};
use splice_project_model::{ClipId, LoadedProject, Transition, TransitionKind};

fn parse_clip_id(raw: &str) -> anyhow::Result<ClipId> {
    uuid::Uuid::parse_str(raw).with_context(|| format!("Invalid clip id: {raw}"))
}

fn load(path: &PathBuf, config: &AppConfig) -> anyhow::Result<(LoadedProject, Editor)> {
    let project =
        LoadedProject::load(path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let editor = Editor::new(project.timeline.clone(), EditorSettings::from(&config.editor));
    Ok((project, editor))
}

fn save(mut project: LoadedProject, editor: Editor) -> anyhow::Result<()> {
    project.timeline = editor.into_timeline();
    project.project.touch();
    project
        .save()
        .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))
}

pub fn split(path: PathBuf, clip: &str, at: f64, config: &AppConfig) -> anyhow::Result<()> {
    let clip_id = parse_clip_id(clip)?;
    let (project, mut editor) = load(&path, config)?;

    match editor.split_clip(clip_id, at)? {
        Some((head, tail)) => {
            println!("Split {clip_id} at {at:.3}s");
            println!("  Head: {head}");
            println!("  Tail: {tail}");
            save(project, editor)
        }
        None => {
            println!("Nothing to split: {at:.3}s is too close to the clip edges or outside the clip.");
            Ok(())
        }
    }
}

pub fn transition(
    path: PathBuf,
    clip: &str,
    kind: &str,
    beat_sync: bool,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let clip_id = parse_clip_id(clip)?;
    let (project, mut editor) = load(&path, config)?;

    let transition = if kind == "none" {
        None
    } else {
        let kind = TransitionKind::from_name(kind).with_context(|| {
            format!("Unknown transition: {kind}. Use: cut, crossfade, zoom, slide, whipPan, glitch, fadeToBlack, none")
        })?;
        Some(if beat_sync {
            Transition::beat_synced(kind, editor.timeline().bpm)
        } else {
            Transition::new(kind)
        })
    };

    editor.set_transition(clip_id, transition)?;
    match transition {
        Some(t) => println!(
            "Clip {clip_id}: {:?} transition, {:.3}s",
            t.kind,
            t.effective_duration()
        ),
        None => println!("Clip {clip_id}: transition removed"),
    }
    save(project, editor)
}
