//! Tracks: ordered, non-overlapping clip sequences of one kind.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clip::{Clip, ClipId};
use crate::effects::EffectsChain;

/// Unique track identifier.
pub type TrackId = Uuid;

/// What a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Instrument,
    Video,
    Text,
    Sticker,
}

impl TrackKind {
    /// Whether clips on this track contribute to the audio mixdown.
    pub fn is_audible(self) -> bool {
        matches!(self, TrackKind::Audio | TrackKind::Instrument)
    }

    /// Whether clips on this track produce video frames.
    pub fn is_visual(self) -> bool {
        !self.is_audible()
    }
}

/// A track on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub kind: TrackKind,
    #[serde(default)]
    pub name: String,
    /// Clips sorted by `start_time`, never overlapping.
    #[serde(default)]
    pub clips: Vec<Clip>,
    #[serde(default)]
    pub muted: bool,
    /// Track gain in `[0.0, 1.0]`.
    #[serde(default = "default_volume")]
    pub volume: f64,
    /// Track-level processing applied before the track gain.
    #[serde(default)]
    pub effects: EffectsChain,
}

fn default_volume() -> f64 {
    1.0
}

impl Track {
    /// Create an empty, unmuted track at full volume.
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            clips: vec![],
            muted: false,
            volume: 1.0,
            effects: EffectsChain::default(),
        }
    }

    /// Position of a clip in `clips`.
    pub fn index_of(&self, clip_id: ClipId) -> Option<usize> {
        self.clips.iter().position(|c| c.id == clip_id)
    }

    pub fn clip(&self, clip_id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == clip_id)
    }

    pub fn clip_mut(&mut self, clip_id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == clip_id)
    }

    /// Re-establish `start_time` ordering.
    pub fn sort_clips(&mut self) {
        self.clips.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    }

    /// Legal window for the clip at `index`: `(previous end, next start)`.
    ///
    /// The previous end is `0.0` for the first clip; the next start is
    /// `None` for the last clip.
    pub fn neighbor_bounds(&self, index: usize) -> (f64, Option<f64>) {
        let prev_end = index
            .checked_sub(1)
            .and_then(|i| self.clips.get(i))
            .map(Clip::end_time)
            .unwrap_or(0.0);
        let next_start = self.clips.get(index + 1).map(|c| c.start_time);
        (prev_end, next_start)
    }

    /// End of the last clip (0.0 for an empty track).
    pub fn end_time(&self) -> f64 {
        self.clips
            .iter()
            .map(Clip::end_time)
            .fold(0.0, f64::max)
    }

    /// Clip playing at `time`, if any.
    pub fn clip_at(&self, time: f64) -> Option<&Clip> {
        self.clips.iter().find(|c| c.contains(time))
    }

    /// Set the track gain, clamped to `[0.0, 1.0]`.
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with(clips: &[(f64, f64)]) -> Track {
        let mut track = Track::new(TrackKind::Text, "titles");
        for (start, dur) in clips {
            track.clips.push(Clip::text("t", *start, *dur));
        }
        track
    }

    #[test]
    fn test_neighbor_bounds() {
        let track = track_with(&[(0.0, 2.0), (3.0, 1.0), (6.0, 2.0)]);
        assert_eq!(track.neighbor_bounds(0), (0.0, Some(3.0)));
        assert_eq!(track.neighbor_bounds(1), (2.0, Some(6.0)));
        assert_eq!(track.neighbor_bounds(2), (4.0, None));
    }

    #[test]
    fn test_sort_and_end_time() {
        let mut track = track_with(&[(6.0, 2.0), (0.0, 2.0)]);
        track.sort_clips();
        assert_eq!(track.clips[0].start_time, 0.0);
        assert!((track.end_time() - 8.0).abs() < 1e-12);
        assert!(track.clip_at(7.0).is_some());
        assert!(track.clip_at(4.0).is_none());
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut track = Track::new(TrackKind::Audio, "music");
        track.set_volume(1.7);
        assert_eq!(track.volume, 1.0);
        track.set_volume(-0.2);
        assert_eq!(track.volume, 0.0);
    }

    #[test]
    fn test_kind_classification() {
        assert!(TrackKind::Instrument.is_audible());
        assert!(TrackKind::Sticker.is_visual());
    }
}
