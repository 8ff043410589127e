//! The editable arrangement: all tracks plus tempo.

use serde::{Deserialize, Serialize};

use crate::clip::{Clip, ClipId, MIN_CLIP_DURATION, TIME_EPSILON};
use crate::track::{Track, TrackId, TrackKind};

/// Record-format marker written into `timeline.json`. Informational only.
pub const TIMELINE_FORMAT_VERSION: &str = "1.0";

/// Location of a clip inside a timeline: `(track index, clip index)`.
pub type ClipLocation = (usize, usize);

/// Complete editing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Informational record-format marker. Loading never checks it and no
    /// migration is keyed on it.
    #[serde(default = "default_version")]
    pub version: String,

    /// Tempo used for beat-synced transitions.
    #[serde(default = "default_bpm")]
    pub bpm: f64,

    /// Tracks in stacking order (later tracks draw on top).
    #[serde(default)]
    pub tracks: Vec<Track>,
}

fn default_version() -> String {
    TIMELINE_FORMAT_VERSION.to_string()
}

fn default_bpm() -> f64 {
    120.0
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    /// An empty timeline at 120 BPM.
    pub fn new() -> Self {
        Self {
            version: default_version(),
            bpm: default_bpm(),
            tracks: vec![],
        }
    }

    /// A timeline seeded with one media track holding the initial import.
    pub fn with_initial_import(clip: Clip) -> Self {
        let kind = clip.payload.track_kind();
        let mut track = Track::new(kind, default_track_name(kind, 1));
        let mut clip = clip;
        clip.start_time = 0.0;
        track.clips.push(clip);

        let mut timeline = Self::new();
        timeline.tracks.push(track);
        timeline
    }

    pub fn track(&self, track_id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    pub fn track_mut(&mut self, track_id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == track_id)
    }

    /// Find where a clip lives.
    pub fn locate(&self, clip_id: ClipId) -> Option<ClipLocation> {
        self.tracks.iter().enumerate().find_map(|(ti, track)| {
            track.index_of(clip_id).map(|ci| (ti, ci))
        })
    }

    pub fn clip(&self, clip_id: ClipId) -> Option<&Clip> {
        self.locate(clip_id)
            .map(|(ti, ci)| &self.tracks[ti].clips[ci])
    }

    /// End of the last clip on any track.
    pub fn end_time(&self) -> f64 {
        self.tracks.iter().map(Track::end_time).fold(0.0, f64::max)
    }

    /// Total number of clips across all tracks.
    pub fn clip_count(&self) -> usize {
        self.tracks.iter().map(|t| t.clips.len()).sum()
    }

    /// Check the structural invariants and describe every violation.
    ///
    /// An empty result means the timeline is consistent.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = vec![];

        for track in &self.tracks {
            if !(0.0..=1.0).contains(&track.volume) {
                errors.push(format!(
                    "Track '{}' volume {} outside [0, 1]",
                    track.name, track.volume
                ));
            }

            for pair in track.clips.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if a.start_time > b.start_time {
                    errors.push(format!("Track '{}' clips are not sorted", track.name));
                }
                if a.end_time() > b.start_time + TIME_EPSILON {
                    errors.push(format!(
                        "Track '{}' clips {} and {} overlap",
                        track.name, a.id, b.id
                    ));
                }
            }

            for clip in &track.clips {
                if clip.payload.track_kind() != track.kind {
                    errors.push(format!(
                        "Clip {} ({:?}) does not belong on {:?} track '{}'",
                        clip.id,
                        clip.payload.track_kind(),
                        track.kind,
                        track.name
                    ));
                }
                if clip.start_time < 0.0 {
                    errors.push(format!("Clip {} starts before zero", clip.id));
                }
                if clip.duration < MIN_CLIP_DURATION - TIME_EPSILON {
                    errors.push(format!(
                        "Clip {} duration {:.4}s is below the {MIN_CLIP_DURATION}s minimum",
                        clip.id, clip.duration
                    ));
                }
                if clip.source_offset < 0.0 {
                    errors.push(format!("Clip {} has a negative source offset", clip.id));
                }
                if clip.source_end() > clip.source_duration + TIME_EPSILON {
                    errors.push(format!(
                        "Clip {} reads past its source ({:.4}s > {:.4}s)",
                        clip.id,
                        clip.source_end(),
                        clip.source_duration
                    ));
                }
                if clip.fade.fade_in < 0.0
                    || clip.fade.fade_out < 0.0
                    || clip.fade.fade_in + clip.fade.fade_out > clip.duration + TIME_EPSILON
                {
                    errors.push(format!("Clip {} fades exceed its span", clip.id));
                }
            }
        }

        errors
    }
}

/// Default display name for the `n`th track of a kind.
pub fn default_track_name(kind: TrackKind, n: usize) -> String {
    let label = match kind {
        TrackKind::Audio => "Audio",
        TrackKind::Instrument => "Instrument",
        TrackKind::Video => "Video",
        TrackKind::Text => "Text",
        TrackKind::Sticker => "Sticker",
    };
    format!("{label} {n}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::SourceRef;

    #[test]
    fn test_version_marker_is_not_checked_on_load() {
        let timeline: Timeline = serde_json::from_str(r#"{"bpm": 90.0, "tracks": []}"#).unwrap();
        assert_eq!(timeline.version, TIMELINE_FORMAT_VERSION);
        assert_eq!(timeline.bpm, 90.0);

        let future: Timeline =
            serde_json::from_str(r#"{"version": "7.3", "tracks": []}"#).unwrap();
        assert_eq!(future.version, "7.3");
        assert!(future.validate().is_empty());
    }

    #[test]
    fn test_initial_import_seeds_one_track() {
        let clip = Clip::video(SourceRef::new("sources/intro.mp4"), 3.0, 5.0, 5.0);
        let id = clip.id;
        let timeline = Timeline::with_initial_import(clip);

        assert_eq!(timeline.tracks.len(), 1);
        assert_eq!(timeline.tracks[0].kind, TrackKind::Video);
        assert_eq!(timeline.locate(id), Some((0, 0)));
        assert_eq!(timeline.clip(id).unwrap().start_time, 0.0);
        assert!(timeline.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_overlap_and_wrong_kind() {
        let mut track = Track::new(TrackKind::Audio, "dialog");
        track
            .clips
            .push(Clip::audio(SourceRef::new("a.wav"), 0.0, 4.0, 10.0));
        track
            .clips
            .push(Clip::audio(SourceRef::new("b.wav"), 3.0, 2.0, 10.0));
        track.clips.push(Clip::text("oops", 8.0, 1.0));

        let mut timeline = Timeline::new();
        timeline.tracks.push(track);

        let errors = timeline.validate();
        assert!(errors.iter().any(|e| e.contains("overlap")));
        assert!(errors.iter().any(|e| e.contains("does not belong")));
    }

    #[test]
    fn test_end_time_and_clip_count() {
        let mut timeline = Timeline::new();
        let mut a = Track::new(TrackKind::Text, "a");
        a.clips.push(Clip::text("x", 1.0, 2.0));
        let mut b = Track::new(TrackKind::Sticker, "b");
        b.clips.push(Clip::sticker("s", 4.0, 1.5));
        timeline.tracks.extend([a, b]);

        assert!((timeline.end_time() - 5.5).abs() < 1e-12);
        assert_eq!(timeline.clip_count(), 2);
    }

    #[test]
    fn test_timeline_json_round_trip() {
        let clip = Clip::audio(SourceRef::new("a.wav"), 0.0, 2.0, 4.0).with_fade(0.5, 0.25);
        let timeline = Timeline::with_initial_import(clip);
        let json = serde_json::to_string_pretty(&timeline).unwrap();
        let parsed: Timeline = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, timeline);
    }
}
