//! Clips: time-bounded references to a span of a source placed on a track.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::effects::EffectsChain;
use crate::note::{InstrumentPatch, Note};
use crate::track::TrackKind;
use crate::transition::Transition;

/// Unique clip identifier.
pub type ClipId = Uuid;

/// Minimum clip duration in seconds. Every committed edit enforces it.
pub const MIN_CLIP_DURATION: f64 = 0.1;

/// Source length used by clips without a finite source (notes, text, stickers).
pub const UNBOUNDED_SOURCE_SECS: f64 = 86_400.0;

/// Tolerance for floating-point invariant checks.
pub const TIME_EPSILON: f64 = 1e-9;

/// Opaque handle to decodable media (typically a project-relative path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(pub String);

impl SourceRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fade-in and fade-out lengths (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Fade {
    #[serde(rename = "in")]
    pub fade_in: f64,
    #[serde(rename = "out")]
    pub fade_out: f64,
}

/// Color adjustments for video clips. Each control is in `[-1.0, 1.0]`,
/// with `0.0` leaving the image untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualFilter {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    /// Warm (positive) / cool (negative) shift.
    pub temperature: f64,
}

/// Text overlay styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    /// RGBA color.
    pub color: [u8; 4],
    /// Normalized position of the text anchor.
    pub x: f64,
    pub y: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            font_size: 48.0,
            color: [255, 255, 255, 255],
            x: 0.5,
            y: 0.85,
        }
    }
}

/// What a clip plays. One variant per track kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClipPayload {
    Video {
        source: SourceRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<VisualFilter>,
    },
    Audio {
        source: SourceRef,
    },
    Instrument {
        #[serde(default)]
        notes: Vec<Note>,
        #[serde(default)]
        patch: InstrumentPatch,
    },
    Text {
        text: String,
        #[serde(default)]
        style: TextStyle,
    },
    Sticker {
        asset: String,
    },
}

impl ClipPayload {
    /// The track kind this payload belongs on.
    pub fn track_kind(&self) -> TrackKind {
        match self {
            ClipPayload::Video { .. } => TrackKind::Video,
            ClipPayload::Audio { .. } => TrackKind::Audio,
            ClipPayload::Instrument { .. } => TrackKind::Instrument,
            ClipPayload::Text { .. } => TrackKind::Text,
            ClipPayload::Sticker { .. } => TrackKind::Sticker,
        }
    }
}

/// A clip placed on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    /// Timeline position (seconds, >= 0).
    pub start_time: f64,
    /// Timeline length (seconds, >= [`MIN_CLIP_DURATION`]).
    pub duration: f64,
    /// Position inside the source of the clip's first sample/frame.
    #[serde(default)]
    pub source_offset: f64,
    /// Playback-rate multiplier.
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Upper bound for `source_offset + duration * speed`.
    pub source_duration: f64,
    #[serde(default)]
    pub fade: Fade,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<EffectsChain>,
    /// Transition into the next clip, attached to this clip's end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    pub payload: ClipPayload,
}

fn default_speed() -> f64 {
    1.0
}

impl Clip {
    /// Create a clip with a fresh id. The result is normalized.
    pub fn new(payload: ClipPayload, start_time: f64, duration: f64, source_duration: f64) -> Self {
        let mut clip = Self {
            id: Uuid::new_v4(),
            start_time,
            duration,
            source_offset: 0.0,
            speed: 1.0,
            source_duration,
            fade: Fade::default(),
            effects: None,
            transition: None,
            payload,
        };
        clip.normalize();
        clip
    }

    /// An audio clip covering `duration` seconds of `source`.
    pub fn audio(source: SourceRef, start_time: f64, duration: f64, source_duration: f64) -> Self {
        Self::new(
            ClipPayload::Audio { source },
            start_time,
            duration,
            source_duration,
        )
    }

    /// A video clip covering `duration` seconds of `source`.
    pub fn video(source: SourceRef, start_time: f64, duration: f64, source_duration: f64) -> Self {
        Self::new(
            ClipPayload::Video {
                source,
                filter: None,
            },
            start_time,
            duration,
            source_duration,
        )
    }

    /// An instrument clip playing `notes` with `patch`.
    pub fn instrument(notes: Vec<Note>, patch: InstrumentPatch, start_time: f64, duration: f64) -> Self {
        Self::new(
            ClipPayload::Instrument { notes, patch },
            start_time,
            duration,
            UNBOUNDED_SOURCE_SECS,
        )
    }

    /// A text overlay clip.
    pub fn text(text: impl Into<String>, start_time: f64, duration: f64) -> Self {
        Self::new(
            ClipPayload::Text {
                text: text.into(),
                style: TextStyle::default(),
            },
            start_time,
            duration,
            UNBOUNDED_SOURCE_SECS,
        )
    }

    /// A sticker overlay clip.
    pub fn sticker(asset: impl Into<String>, start_time: f64, duration: f64) -> Self {
        Self::new(
            ClipPayload::Sticker {
                asset: asset.into(),
            },
            start_time,
            duration,
            UNBOUNDED_SOURCE_SECS,
        )
    }

    pub fn with_offset(mut self, source_offset: f64) -> Self {
        self.source_offset = source_offset;
        self.normalize();
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self.normalize();
        self
    }

    pub fn with_fade(mut self, fade_in: f64, fade_out: f64) -> Self {
        self.fade = Fade { fade_in, fade_out };
        self.normalize();
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }

    pub fn with_effects(mut self, effects: EffectsChain) -> Self {
        self.effects = Some(effects);
        self
    }

    /// Timeline end (`start_time + duration`).
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Amount of source consumed (`duration * speed`).
    pub fn source_span(&self) -> f64 {
        self.duration * self.speed
    }

    /// Source position of the clip's last sample.
    pub fn source_end(&self) -> f64 {
        self.source_offset + self.source_span()
    }

    /// Longest timeline duration the source allows from the current offset.
    pub fn max_duration(&self) -> f64 {
        ((self.source_duration - self.source_offset) / self.speed).max(0.0)
    }

    /// Whether two clips share any timeline time.
    pub fn overlaps(&self, other: &Clip) -> bool {
        self.start_time < other.end_time() - TIME_EPSILON
            && other.start_time < self.end_time() - TIME_EPSILON
    }

    /// Whether `time` falls inside `[start_time, end_time)`.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time < self.end_time()
    }

    /// Source reference for media-backed clips.
    pub fn source(&self) -> Option<&SourceRef> {
        match &self.payload {
            ClipPayload::Video { source, .. } | ClipPayload::Audio { source } => Some(source),
            _ => None,
        }
    }

    /// Notes of an instrument clip; empty for everything else.
    pub fn notes(&self) -> &[Note] {
        match &self.payload {
            ClipPayload::Instrument { notes, .. } => notes,
            _ => &[],
        }
    }

    /// Bring every field back inside its legal range.
    ///
    /// Order matters: offset and speed first, then duration against the
    /// source bound, then the minimum duration as final authority, then
    /// fades against the resulting span.
    pub fn normalize(&mut self) {
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            self.start_time = 0.0;
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            self.speed = 1.0;
        }
        if !self.source_duration.is_finite() {
            self.source_duration = UNBOUNDED_SOURCE_SECS;
        }
        self.source_duration = self.source_duration.max(MIN_CLIP_DURATION * self.speed);
        let max_offset = self.source_duration - MIN_CLIP_DURATION * self.speed;
        self.source_offset = self.source_offset.clamp(0.0, max_offset.max(0.0));
        if !self.duration.is_finite() {
            self.duration = MIN_CLIP_DURATION;
        }
        self.duration = self.duration.min(self.max_duration()).max(MIN_CLIP_DURATION);
        self.clamp_fades();
    }

    /// Constrain fades so neither is negative and they never cross.
    pub fn clamp_fades(&mut self) {
        let span = self.duration.max(0.0);
        let fade_in = self.fade.fade_in.clamp(0.0, span);
        let fade_out = self.fade.fade_out.clamp(0.0, span - fade_in);
        self.fade = Fade { fade_in, fade_out };
    }

    /// Copy of this clip with a new id (used by split and duplicate).
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }
}
