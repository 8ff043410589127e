//! Offline mixdown: drives a fresh [`RenderGraph`] over a timeline snapshot.

use splice_common::config::RenderDefaults;
use splice_common::time::{frames_to_secs, secs_to_frames};
use splice_project_model::{ExportConfig, Timeline};

use crate::cache::MediaCache;
use crate::cancel::CancelToken;
use crate::error::{RenderError, RenderResult};
use crate::graph::{GraphConfig, InvalidClip, RenderGraph};

/// Settings for one mixdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixdownConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Render length. `None` renders to the timeline end plus `tail_secs`.
    pub duration: Option<f64>,
    /// Extra time after the last clip so releases can ring out.
    pub tail_secs: f64,
    pub master_gain: f64,
    /// Frames per processing block.
    pub block_size: usize,
}

impl Default for MixdownConfig {
    fn default() -> Self {
        Self::from_defaults(&RenderDefaults::default())
    }
}

impl MixdownConfig {
    pub fn from_defaults(defaults: &RenderDefaults) -> Self {
        Self {
            sample_rate: defaults.sample_rate,
            channels: defaults.channels,
            duration: None,
            tail_secs: defaults.tail_secs,
            master_gain: 1.0,
            block_size: defaults.block_size,
        }
    }

    /// Project export settings layered over the application defaults.
    pub fn for_export(export: &ExportConfig, defaults: &RenderDefaults) -> Self {
        Self {
            sample_rate: export.sample_rate,
            channels: export.channels,
            master_gain: export.master_gain,
            ..Self::from_defaults(defaults)
        }
    }

    /// Render length for `snapshot`.
    pub fn resolve_duration(&self, snapshot: &Timeline) -> f64 {
        match self.duration {
            Some(d) if d.is_finite() => d.max(0.0),
            _ => snapshot.end_time() + self.tail_secs.max(0.0),
        }
    }
}

/// Interleaved float samples.
#[derive(Debug, Clone, PartialEq)]
pub struct MixBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl MixBuffer {
    pub fn silent(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self {
            sample_rate,
            channels,
            samples: vec![0.0; frames * channels as usize],
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        frames_to_secs(self.frames() as u64, self.sample_rate)
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}

/// What a finished mixdown produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    pub frames: u64,
    pub duration_secs: f64,
    pub tracks_rendered: usize,
    pub invalid_clips: Vec<InvalidClip>,
}

/// Render `snapshot` to a clamped float buffer.
pub fn render_mixdown(
    snapshot: &Timeline,
    cache: &MediaCache,
    config: &MixdownConfig,
    cancel: &CancelToken,
) -> RenderResult<(MixBuffer, RenderReport)> {
    render_mixdown_with_progress(snapshot, cache, config, cancel, &mut |_| {})
}

/// [`render_mixdown`] reporting progress in `[0, 1]` after every block.
#[tracing::instrument(skip_all, fields(sample_rate = config.sample_rate, channels = config.channels))]
pub fn render_mixdown_with_progress(
    snapshot: &Timeline,
    cache: &MediaCache,
    config: &MixdownConfig,
    cancel: &CancelToken,
    on_progress: &mut dyn FnMut(f64),
) -> RenderResult<(MixBuffer, RenderReport)> {
    cancel.check()?;

    let duration = config.resolve_duration(snapshot);
    let channels = config.channels as usize;
    let total_frames = secs_to_frames(duration, config.sample_rate);
    let block = config.block_size.max(1);

    let mut graph = RenderGraph::build(
        snapshot,
        cache,
        GraphConfig {
            sample_rate: config.sample_rate,
            channels,
            duration,
        },
    )?;

    let started = std::time::Instant::now();
    let master = config.master_gain.max(0.0) as f32;
    let mut samples = Vec::with_capacity(total_frames as usize * channels);
    let mut block_buf = vec![0.0f32; block * channels];
    let mut frame = 0u64;

    while frame < total_frames {
        if let Err(err) = cancel.check() {
            graph.teardown();
            tracing::info!(frame, total_frames, "Mixdown cancelled");
            return Err(err);
        }
        let n = (total_frames - frame).min(block as u64) as usize;
        let out = &mut block_buf[..n * channels];
        graph.render_block(frame, n, out)?;
        samples.extend(out.iter().map(|s| (s * master).clamp(-1.0, 1.0)));
        frame += n as u64;
        on_progress(frame as f64 / total_frames as f64);
    }

    let report = RenderReport {
        frames: total_frames,
        duration_secs: duration,
        tracks_rendered: graph.track_count(),
        invalid_clips: graph.invalid_clips().to_vec(),
    };
    graph.teardown();

    tracing::info!(
        frames = total_frames,
        duration_secs = duration,
        invalid_clips = report.invalid_clips.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Mixdown complete"
    );

    Ok((
        MixBuffer {
            sample_rate: config.sample_rate,
            channels: config.channels,
            samples,
        },
        report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodedAudio, InMemoryDecoder};
    use splice_project_model::{
        Clip, InstrumentPatch, Note, SourceRef, Track, TrackKind,
    };

    fn small_config() -> MixdownConfig {
        MixdownConfig {
            sample_rate: 8_000,
            channels: 2,
            duration: None,
            tail_secs: 0.5,
            master_gain: 1.0,
            block_size: 256,
        }
    }

    fn song() -> Timeline {
        let mut timeline = Timeline::new();
        let mut keys = Track::new(TrackKind::Instrument, "keys");
        keys.clips.push(Clip::instrument(
            vec![Note::new(60, 0.0, 0.4, 0.9), Note::new(67, 0.5, 0.4, 0.7)],
            InstrumentPatch::default(),
            0.0,
            1.0,
        ));
        let mut bed = Track::new(TrackKind::Audio, "bed");
        bed.clips
            .push(Clip::audio(SourceRef::new("bed"), 0.25, 0.5, 2.0).with_fade(0.1, 0.1));
        timeline.tracks.extend([keys, bed]);
        timeline
    }

    fn cache() -> MediaCache {
        MediaCache::new(
            InMemoryDecoder::new().with_audio("bed", DecodedAudio::new(8_000, vec![vec![0.3; 16_000]])),
        )
    }

    #[test]
    fn test_duration_defaults_to_end_plus_tail() {
        let (mix, report) =
            render_mixdown(&song(), &cache(), &small_config(), &CancelToken::new()).unwrap();
        assert_eq!(report.frames, 12_000);
        assert_eq!(mix.frames(), 12_000);
        assert_eq!(report.tracks_rendered, 2);
        assert!(mix.peak() > 0.0);
        assert!(mix.peak() <= 1.0);
    }

    #[test]
    fn test_render_is_deterministic() {
        let snapshot = song();
        let config = small_config();
        let (a, _) = render_mixdown(&snapshot, &cache(), &config, &CancelToken::new()).unwrap();
        let (b, _) = render_mixdown(&snapshot, &cache(), &config, &CancelToken::new()).unwrap();
        assert_eq!(a, b);

        // Block size must not change the result.
        let small_blocks = MixdownConfig {
            block_size: 17,
            ..config
        };
        let (c, _) = render_mixdown(&snapshot, &cache(), &small_blocks, &CancelToken::new()).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn test_output_is_clamped() {
        let config = MixdownConfig {
            master_gain: 50.0,
            ..small_config()
        };
        let (mix, _) = render_mixdown(&song(), &cache(), &config, &CancelToken::new()).unwrap();
        assert!(mix.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert_eq!(mix.peak(), 1.0);
    }

    #[test]
    fn test_decode_failure_renders_the_rest() {
        let cache = MediaCache::new(InMemoryDecoder::new().with_failure("bed", "corrupt"));
        let (mix, report) =
            render_mixdown(&song(), &cache, &small_config(), &CancelToken::new()).unwrap();
        assert_eq!(report.invalid_clips.len(), 1);
        assert!(mix.peak() > 0.0);
    }

    #[test]
    fn test_cancel_mid_render_returns_cancelled() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let mut calls = 0;
        let result = render_mixdown_with_progress(
            &song(),
            &cache(),
            &small_config(),
            &cancel,
            &mut |p| {
                calls += 1;
                if p > 0.3 {
                    trigger.cancel();
                }
            },
        );
        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert!(calls < 47);
    }

    #[test]
    fn test_explicit_duration_skips_late_clips() {
        let config = MixdownConfig {
            duration: Some(0.2),
            ..small_config()
        };
        let (mix, report) = render_mixdown(&song(), &cache(), &config, &CancelToken::new()).unwrap();
        assert_eq!(mix.frames(), 1_600);
        assert!(report.invalid_clips.is_empty());
    }
}
