//! Per-export render graph.
//!
//! ```text
//! clip source ─► [clip strip] ─► fades ─┐
//! clip source ─► [clip strip] ─► fades ─┼─► track EQ ─► compressor ─► track gain ─► master
//! note voices ─► [clip strip] ─► fades ─┘
//! ```
//!
//! A graph is built from one immutable timeline snapshot and rendered block
//! by block. It is never reused: teardown drops every node and is safe to
//! call more than once.

use std::sync::Arc;

use splice_common::time::{frames_to_secs, secs_to_frames};
use splice_project_model::{Clip, ClipId, ClipPayload, Timeline, Track, TrackId};

use crate::cache::MediaCache;
use crate::decode::DecodedAudio;
use crate::dsp::ChannelStrip;
use crate::error::{RenderError, RenderResult};
use crate::synth::ScheduledVoice;

/// A clip that could not be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidClip {
    pub clip_id: ClipId,
    pub track_id: TrackId,
    pub reason: String,
}

enum ClipSource {
    Samples {
        audio: Arc<DecodedAudio>,
        source_offset: f64,
        speed: f64,
    },
    Notes(Vec<ScheduledVoice>),
}

struct ClipNode {
    clip_id: ClipId,
    start: f64,
    duration: f64,
    fade_in: f64,
    fade_out: f64,
    /// First frame after which the node can no longer produce sound.
    end_frame: u64,
    start_frame: u64,
    source: ClipSource,
    strip: Option<ChannelStrip>,
}

struct TrackNode {
    track_id: TrackId,
    clips: Vec<ClipNode>,
    strip: ChannelStrip,
    gain: f32,
}

/// Graph settings that do not depend on the timeline.
#[derive(Debug, Clone, Copy)]
pub struct GraphConfig {
    pub sample_rate: u32,
    pub channels: usize,
    /// Render length in seconds. Sources starting at or after it are skipped.
    pub duration: f64,
}

pub struct RenderGraph {
    config: GraphConfig,
    tracks: Vec<TrackNode>,
    invalid: Vec<InvalidClip>,
    torn_down: bool,
    scratch_track: Vec<f32>,
    scratch_clip: Vec<f32>,
    scratch_mono: Vec<f32>,
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("tracks", &self.tracks.len())
            .field("sources", &self.source_count())
            .field("invalid", &self.invalid.len())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl RenderGraph {
    /// Build the graph for every audible, non-muted track in `snapshot`.
    ///
    /// Clips whose source fails to decode are recorded as invalid and left
    /// out; that never fails the build.
    pub fn build(snapshot: &Timeline, cache: &MediaCache, config: GraphConfig) -> RenderResult<Self> {
        if config.channels == 0 || config.sample_rate == 0 {
            return Err(RenderError::graph(format!(
                "invalid output format: {} Hz, {} channels",
                config.sample_rate, config.channels
            )));
        }

        let mut graph = Self {
            config,
            tracks: vec![],
            invalid: vec![],
            torn_down: false,
            scratch_track: vec![],
            scratch_clip: vec![],
            scratch_mono: vec![],
        };

        for track in snapshot.tracks.iter().filter(|t| t.kind.is_audible()) {
            if track.muted {
                tracing::debug!(track = %track.name, "Skipping muted track");
                continue;
            }
            let node = graph.build_track(track, cache);
            graph.tracks.push(node);
        }

        tracing::debug!(
            tracks = graph.tracks.len(),
            sources = graph.source_count(),
            invalid = graph.invalid.len(),
            "Render graph built"
        );
        Ok(graph)
    }

    fn build_track(&mut self, track: &Track, cache: &MediaCache) -> TrackNode {
        let GraphConfig {
            sample_rate,
            channels,
            duration,
        } = self.config;

        let mut clips = vec![];
        for clip in &track.clips {
            if clip.start_time >= duration {
                continue;
            }
            let source = match &clip.payload {
                ClipPayload::Audio { source } => match cache.audio(source) {
                    Ok(audio) => ClipSource::Samples {
                        audio,
                        source_offset: clip.source_offset,
                        speed: clip.speed,
                    },
                    Err(err) => {
                        tracing::warn!(
                            clip = %clip.id,
                            source = %source,
                            error = %err,
                            "Excluding clip from render: decode failed"
                        );
                        self.invalid.push(InvalidClip {
                            clip_id: clip.id,
                            track_id: track.id,
                            reason: err.to_string(),
                        });
                        continue;
                    }
                },
                ClipPayload::Instrument { notes, patch } => {
                    let voices = notes
                        .iter()
                        .filter(|n| n.start_time < clip.duration)
                        .filter(|n| clip.start_time + n.start_time < duration)
                        .map(|n| {
                            let mut note = *n;
                            // Hold never extends past the clip; the release may.
                            note.duration = note.duration.min(clip.duration - note.start_time);
                            ScheduledVoice::schedule(
                                clip.start_time + note.start_time,
                                &note,
                                patch,
                                sample_rate,
                            )
                        })
                        .collect();
                    ClipSource::Notes(voices)
                }
                // Visual payloads never sit on audible tracks.
                ClipPayload::Video { .. } | ClipPayload::Text { .. } | ClipPayload::Sticker { .. } => {
                    continue
                }
            };
            clips.push(self.clip_node(clip, source));
        }

        TrackNode {
            track_id: track.id,
            clips,
            strip: ChannelStrip::new(&track.effects, sample_rate, channels),
            gain: track.volume.clamp(0.0, 1.0) as f32,
        }
    }

    fn clip_node(&self, clip: &Clip, source: ClipSource) -> ClipNode {
        let sr = self.config.sample_rate;
        let end = match &source {
            ClipSource::Samples { .. } => clip.end_time(),
            ClipSource::Notes(voices) => voices
                .iter()
                .filter_map(ScheduledVoice::stop_time)
                .fold(clip.end_time(), f64::max),
        };
        ClipNode {
            clip_id: clip.id,
            start: clip.start_time,
            duration: clip.duration,
            fade_in: clip.fade.fade_in,
            fade_out: clip.fade.fade_out,
            start_frame: secs_to_frames(clip.start_time, sr),
            end_frame: secs_to_frames(end, sr) + 1,
            source,
            strip: clip
                .effects
                .as_ref()
                .filter(|e| !e.is_neutral())
                .map(|e| ChannelStrip::new(e, sr, self.config.channels)),
        }
    }

    /// Clips excluded because their source failed to decode.
    pub fn invalid_clips(&self) -> &[InvalidClip] {
        &self.invalid
    }

    /// Number of clip sources still held by the graph.
    pub fn source_count(&self) -> usize {
        self.tracks.iter().map(|t| t.clips.len()).sum()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// `(track, clip)` pairs that currently hold a scheduled source.
    pub fn scheduled_clips(&self) -> Vec<(TrackId, ClipId)> {
        self.tracks
            .iter()
            .flat_map(|t| t.clips.iter().map(move |c| (t.track_id, c.clip_id)))
            .collect()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Render `frames` frames starting at absolute frame `first_frame` into
    /// `out` (interleaved, pre-master). `out` is overwritten.
    pub fn render_block(&mut self, first_frame: u64, frames: usize, out: &mut [f32]) -> RenderResult<()> {
        if self.torn_down {
            return Err(RenderError::graph("render on a torn-down graph"));
        }
        let channels = self.config.channels;
        let len = frames * channels;
        out[..len].fill(0.0);

        let Self {
            config,
            tracks,
            scratch_track,
            scratch_clip,
            scratch_mono,
            ..
        } = self;
        scratch_track.resize(len, 0.0);
        scratch_clip.resize(len, 0.0);
        scratch_mono.resize(frames, 0.0);
        let block_end = first_frame + frames as u64;

        for track in tracks.iter_mut() {
            scratch_track.fill(0.0);
            for node in &mut track.clips {
                if node.start_frame >= block_end || node.end_frame <= first_frame {
                    continue;
                }
                scratch_clip.fill(0.0);
                node.render(config, first_frame, frames, scratch_clip, scratch_mono);
                for (acc, s) in scratch_track.iter_mut().zip(scratch_clip.iter()) {
                    *acc += *s;
                }
            }
            track.strip.process(scratch_track);
            for (o, s) in out[..len].iter_mut().zip(scratch_track.iter()) {
                *o += *s * track.gain;
            }
        }
        Ok(())
    }

    /// Drop every node. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        let sources = self.source_count();
        for track in self.tracks.drain(..) {
            tracing::trace!(track_id = %track.track_id, clips = track.clips.len(), "Releasing track node");
        }
        self.scratch_track = vec![];
        self.scratch_clip = vec![];
        self.scratch_mono = vec![];
        self.torn_down = true;
        tracing::debug!(sources, "Render graph torn down");
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl ClipNode {
    /// Linear fade gain at clip-relative time `t`.
    fn fade_gain(&self, t: f64) -> f32 {
        let mut g = 1.0;
        if self.fade_in > 0.0 && t < self.fade_in {
            g *= (t / self.fade_in).max(0.0);
        }
        if self.fade_out > 0.0 {
            let remaining = self.duration - t;
            if remaining < self.fade_out {
                g *= (remaining / self.fade_out).max(0.0);
            }
        }
        g as f32
    }

    fn render(
        &mut self,
        config: &GraphConfig,
        first_frame: u64,
        frames: usize,
        out: &mut [f32],
        mono: &mut [f32],
    ) {
        let channels = config.channels;
        let sr = config.sample_rate;

        match &mut self.source {
            ClipSource::Samples {
                audio,
                source_offset,
                speed,
            } => {
                let ratio = audio.sample_rate as f64;
                for i in 0..frames {
                    let t = frames_to_secs(first_frame + i as u64, sr) - self.start;
                    if t < 0.0 || t >= self.duration {
                        continue;
                    }
                    let pos = (*source_offset + t * *speed) * ratio;
                    let frame = &mut out[i * channels..(i + 1) * channels];
                    if channels == 1 && audio.channel_count() > 1 {
                        let n = audio.channel_count();
                        frame[0] = (0..n).map(|c| audio.sample_at(c, pos)).sum::<f32>() / n as f32;
                    } else {
                        for (ch, s) in frame.iter_mut().enumerate() {
                            *s = audio.sample_at(ch, pos);
                        }
                    }
                }
            }
            ClipSource::Notes(voices) => {
                mono.fill(0.0);
                for voice in voices.iter_mut() {
                    voice.render_into(mono, first_frame, sr);
                }
                for (i, m) in mono.iter().enumerate() {
                    out[i * channels..(i + 1) * channels].fill(*m);
                }
            }
        }

        if let Some(strip) = &mut self.strip {
            strip.process(out);
        }

        for i in 0..frames {
            let frame = first_frame + i as u64;
            let samples = &mut out[i * channels..(i + 1) * channels];
            // Nothing leaves the node outside its span, effect tails included.
            if frame < self.start_frame || frame >= self.end_frame {
                samples.fill(0.0);
            } else if self.fade_in > 0.0 || self.fade_out > 0.0 {
                let g = self.fade_gain(frames_to_secs(frame, sr) - self.start);
                for s in samples {
                    *s *= g;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::InMemoryDecoder;
    use splice_project_model::{SourceRef, TrackKind};

    fn config() -> GraphConfig {
        GraphConfig {
            sample_rate: 100,
            channels: 1,
            duration: 2.0,
        }
    }

    fn constant_source(level: f32, frames: usize) -> DecodedAudio {
        DecodedAudio::new(100, vec![vec![level; frames]])
    }

    fn timeline_with(clip: Clip, muted: bool) -> Timeline {
        let mut track = Track::new(TrackKind::Audio, "a");
        track.muted = muted;
        track.clips.push(clip);
        let mut timeline = Timeline::new();
        timeline.tracks.push(track);
        timeline
    }

    #[test]
    fn test_clip_placed_at_start_time() {
        let cache = MediaCache::new(InMemoryDecoder::new().with_audio("s", constant_source(0.5, 500)));
        let clip = Clip::audio(SourceRef::new("s"), 0.5, 1.0, 5.0);
        let mut graph = RenderGraph::build(&timeline_with(clip, false), &cache, config()).unwrap();

        let mut out = vec![0.0; 200];
        graph.render_block(0, 200, &mut out).unwrap();
        assert_eq!(out[49], 0.0);
        assert_eq!(out[50], 0.5);
        assert_eq!(out[149], 0.5);
        assert_eq!(out[150], 0.0);
    }

    #[test]
    fn test_fades_are_linear_ramps() {
        let cache = MediaCache::new(InMemoryDecoder::new().with_audio("s", constant_source(1.0, 500)));
        let clip = Clip::audio(SourceRef::new("s"), 0.0, 1.0, 5.0).with_fade(0.5, 0.5);
        let mut graph = RenderGraph::build(&timeline_with(clip, false), &cache, config()).unwrap();

        let mut out = vec![0.0; 100];
        graph.render_block(0, 100, &mut out).unwrap();
        assert_eq!(out[0], 0.0);
        assert!((out[25] - 0.5).abs() < 1e-6);
        assert!((out[50] - 1.0).abs() < 1e-6);
        assert!((out[75] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_muted_tracks_and_decode_failures_are_excluded() {
        let decoder = InMemoryDecoder::new().with_failure("bad", "truncated header");
        let cache = MediaCache::new(decoder);

        let muted = timeline_with(Clip::audio(SourceRef::new("bad"), 0.0, 1.0, 5.0), true);
        let graph = RenderGraph::build(&muted, &cache, config()).unwrap();
        assert_eq!(graph.track_count(), 0);
        assert!(graph.invalid_clips().is_empty());

        let broken = timeline_with(Clip::audio(SourceRef::new("bad"), 0.0, 1.0, 5.0), false);
        let graph = RenderGraph::build(&broken, &cache, config()).unwrap();
        assert_eq!(graph.invalid_clips().len(), 1);
        assert!(graph.invalid_clips()[0].reason.contains("truncated header"));
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let cache = MediaCache::new(InMemoryDecoder::new().with_audio("s", constant_source(0.5, 500)));
        let clip = Clip::audio(SourceRef::new("s"), 0.0, 1.0, 5.0);
        let mut graph = RenderGraph::build(&timeline_with(clip, false), &cache, config()).unwrap();
        assert_eq!(graph.source_count(), 1);
        assert_eq!(graph.scheduled_clips().len(), 1);

        graph.teardown();
        graph.teardown();
        assert!(graph.is_torn_down());
        assert_eq!(graph.source_count(), 0);
        assert!(graph.scheduled_clips().is_empty());
        let mut out = vec![0.0; 10];
        assert!(graph.render_block(0, 10, &mut out).is_err());
    }

    #[test]
    fn test_speed_and_offset_select_source_span() {
        let ramp: Vec<f32> = (0..500).map(|i| i as f32 / 1000.0).collect();
        let cache = MediaCache::new(InMemoryDecoder::new().with_audio("r", DecodedAudio::new(100, vec![ramp])));
        let clip = Clip::audio(SourceRef::new("r"), 0.0, 1.0, 5.0)
            .with_offset(1.0)
            .with_speed(2.0);
        let mut graph = RenderGraph::build(&timeline_with(clip, false), &cache, config()).unwrap();

        let mut out = vec![0.0; 100];
        graph.render_block(0, 100, &mut out).unwrap();
        assert!((out[0] - 0.1).abs() < 1e-6);
        assert!((out[10] - 0.12).abs() < 1e-6);
    }
}
