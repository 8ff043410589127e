//! Show project information.

use std::path::{Path, PathBuf};

use splice_project_model::{ClipPayload, LoadedProject};
use splice_render_engine::{decode_wav_pcm16, MixBuffer};

fn payload_label(payload: &ClipPayload) -> String {
    match payload {
        ClipPayload::Video { source, .. } => format!("video {source}"),
        ClipPayload::Audio { source } => format!("audio {source}"),
        ClipPayload::Instrument { notes, .. } => format!("instrument, {} note(s)", notes.len()),
        ClipPayload::Text { text, .. } => format!("text {text:?}"),
        ClipPayload::Sticker { asset } => format!("sticker {asset}"),
    }
}

/// Rendered WAV files under `exports/`, sorted by name.
///
/// Files that are not our 16-bit PCM output are skipped with a warning.
fn rendered_mixes(root: &Path) -> Vec<(String, MixBuffer)> {
    let Ok(entries) = std::fs::read_dir(root.join("exports")) else {
        return vec![];
    };
    let mut mixes: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "wav"))
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().into_owned();
            let bytes = std::fs::read(&p).ok()?;
            match decode_wav_pcm16(&bytes) {
                Ok(mix) => Some((name, mix)),
                Err(e) => {
                    tracing::warn!(file = %p.display(), error = %e, "Skipping unreadable export");
                    None
                }
            }
        })
        .collect();
    mixes.sort_by(|a, b| a.0.cmp(&b.0));
    mixes
}

pub fn run(path: PathBuf, json: bool) -> anyhow::Result<()> {
    let project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let p = &project.project;
    let timeline = &project.timeline;
    let mixes = rendered_mixes(&project.root);

    if json {
        let tracks: Vec<_> = timeline
            .tracks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "name": t.name,
                    "kind": t.kind,
                    "muted": t.muted,
                    "volume": t.volume,
                    "clips": t.clips.len(),
                    "end": t.end_time(),
                })
            })
            .collect();
        let summary = serde_json::json!({
            "name": p.name,
            "id": p.id,
            "version": p.version,
            "bpm": timeline.bpm,
            "duration": timeline.end_time(),
            "tracks": tracks,
            "export": p.export,
            "renders": mixes
                .iter()
                .map(|(name, mix)| serde_json::json!({
                    "file": name,
                    "sample_rate": mix.sample_rate,
                    "channels": mix.channels,
                    "duration": mix.duration_secs(),
                    "peak": mix.peak(),
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Project: {}", p.name);
    println!("  ID: {}", p.id);
    println!("  Created: {}", p.created_at);
    println!("  Modified: {}", p.modified_at);
    println!();

    println!("Timeline:");
    println!("  Tempo: {} BPM", timeline.bpm);
    println!("  Duration: {:.2}s", timeline.end_time());
    for track in &timeline.tracks {
        println!(
            "  {} [{:?}]{} vol {:.2}",
            track.name,
            track.kind,
            if track.muted { " (muted)" } else { "" },
            track.volume
        );
        for clip in &track.clips {
            let transition = clip
                .transition
                .map(|t| format!(" -> {:?} {:.2}s", t.kind, t.effective_duration()))
                .unwrap_or_default();
            println!(
                "    {} {:>8.3}s +{:.3}s  {}{}",
                clip.id,
                clip.start_time,
                clip.duration,
                payload_label(&clip.payload),
                transition
            );
        }
    }
    println!();

    println!("Export config:");
    println!("  Format: {:?}", p.export.format);
    println!("  Audio: {} Hz, {} channel(s)", p.export.sample_rate, p.export.channels);
    println!(
        "  Video: {}x{} @ {}fps",
        p.export.width, p.export.height, p.export.fps
    );

    if !mixes.is_empty() {
        println!();
        println!("Rendered mixes:");
        for (name, mix) in &mixes {
            println!(
                "  {name}: {:.2}s, {} Hz, {} channel(s), peak {:.3}",
                mix.duration_secs(),
                mix.sample_rate,
                mix.channels,
                mix.peak()
            );
        }
    }

    Ok(())
}
