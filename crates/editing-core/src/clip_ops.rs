//! Collision-safe clip editing operations.
//!
//! Every operation leaves the owning track sorted and free of overlaps.
//! Requests that would break an invariant are clamped to the nearest legal
//! value; only unknown ids produce an error.

use splice_project_model::{
    Clip, ClipId, ClipPayload, EffectsChain, Fade, Note, Timeline, Track, TrackId, TrackKind,
    Transition, MIN_CLIP_DURATION, TIME_EPSILON,
};

use crate::error::{EditError, EditResult};

/// Distance within which a moved clip snaps flush against a neighbor.
pub const SNAP_TOLERANCE_SECS: f64 = 0.1;

/// Editing operations on a [`Timeline`].
pub trait ClipOps {
    /// Split a clip in two at timeline time `at`.
    ///
    /// Returns the ids of the two halves, or `None` when `at` lies within
    /// [`MIN_CLIP_DURATION`] of either boundary (the timeline is unchanged).
    fn split_clip(&mut self, clip_id: ClipId, at: f64) -> EditResult<Option<(ClipId, ClipId)>>;

    /// Set a clip's start, duration and source offset, clamped against its
    /// neighbors and its source.
    fn trim_clip(
        &mut self,
        clip_id: ClipId,
        new_start: f64,
        new_duration: f64,
        new_offset: f64,
    ) -> EditResult<()>;

    /// Move a clip, snapping flush to neighbors within [`SNAP_TOLERANCE_SECS`].
    fn move_clip(&mut self, clip_id: ClipId, new_start: f64) -> EditResult<f64> {
        self.move_clip_with_snap(clip_id, new_start, SNAP_TOLERANCE_SECS)
    }

    /// Move a clip with an explicit snap tolerance. Returns the resolved start.
    fn move_clip_with_snap(
        &mut self,
        clip_id: ClipId,
        new_start: f64,
        snap_tolerance: f64,
    ) -> EditResult<f64>;

    /// Place a clip on a track at the first free position at or after its
    /// requested start.
    fn add_clip(&mut self, track_id: TrackId, clip: Clip) -> EditResult<ClipId>;

    /// Remove a clip and return it.
    fn delete_clip(&mut self, clip_id: ClipId) -> EditResult<Clip>;

    /// Append an empty track.
    fn add_track(&mut self, kind: TrackKind, name: &str) -> TrackId;

    /// Remove a track together with all of its clips.
    fn remove_track(&mut self, track_id: TrackId) -> EditResult<Track>;

    /// Set fade lengths, clamped so they never cross.
    fn set_fades(&mut self, clip_id: ClipId, fade_in: f64, fade_out: f64) -> EditResult<Fade>;

    fn set_transition(&mut self, clip_id: ClipId, transition: Option<Transition>)
        -> EditResult<()>;

    fn set_clip_effects(&mut self, clip_id: ClipId, effects: Option<EffectsChain>)
        -> EditResult<()>;

    fn set_track_effects(&mut self, track_id: TrackId, effects: EffectsChain) -> EditResult<()>;

    fn set_track_mute(&mut self, track_id: TrackId, muted: bool) -> EditResult<()>;

    /// Set the track gain, clamped to `[0, 1]`.
    fn set_track_volume(&mut self, track_id: TrackId, volume: f64) -> EditResult<()>;
}

impl ClipOps for Timeline {
    fn split_clip(&mut self, clip_id: ClipId, at: f64) -> EditResult<Option<(ClipId, ClipId)>> {
        let (ti, ci) = self
            .locate(clip_id)
            .ok_or(EditError::ClipNotFound(clip_id))?;
        let track = &mut self.tracks[ti];
        let original = track.clips[ci].clone();

        let head_len = at - original.start_time;
        let tail_len = original.end_time() - at;
        if head_len < MIN_CLIP_DURATION - TIME_EPSILON || tail_len < MIN_CLIP_DURATION - TIME_EPSILON
        {
            tracing::debug!(clip = %clip_id, at, "Split rejected: too close to a clip boundary");
            return Ok(None);
        }

        let mut head = original.clone();
        head.duration = head_len;
        head.fade.fade_out = 0.0;
        head.transition = None;

        // The tail inherits filter/effect/text/sticker metadata from the clone.
        let mut tail = original.duplicate();
        tail.start_time = at;
        tail.duration = tail_len;
        tail.source_offset = original.source_offset + head_len * original.speed;
        tail.fade.fade_in = 0.0;

        if let ClipPayload::Instrument { notes, .. } = &original.payload {
            let (head_notes, tail_notes) = partition_notes(notes, head_len);
            if let ClipPayload::Instrument { notes, .. } = &mut head.payload {
                *notes = head_notes;
            }
            if let ClipPayload::Instrument { notes, .. } = &mut tail.payload {
                *notes = tail_notes;
            }
        }

        head.clamp_fades();
        tail.clamp_fades();

        let ids = (head.id, tail.id);
        track.clips[ci] = head;
        track.clips.insert(ci + 1, tail);
        track.sort_clips();

        tracing::debug!(clip = %clip_id, at, head = %ids.0, tail = %ids.1, "Clip split");
        Ok(Some(ids))
    }

    fn trim_clip(
        &mut self,
        clip_id: ClipId,
        new_start: f64,
        new_duration: f64,
        new_offset: f64,
    ) -> EditResult<()> {
        let (ti, ci) = self
            .locate(clip_id)
            .ok_or(EditError::ClipNotFound(clip_id))?;
        let track = &mut self.tracks[ti];
        let (prev_end, next_start) = track.neighbor_bounds(ci);
        let clip = &mut track.clips[ci];
        let speed = clip.speed;

        let mut start = finite_or(new_start, clip.start_time).max(prev_end).max(0.0);
        let mut duration = finite_or(new_duration, clip.duration);
        if let Some(next) = next_start {
            duration = duration.min(next - start);
        }

        let max_offset = (clip.source_duration - MIN_CLIP_DURATION * speed).max(0.0);
        let offset = finite_or(new_offset, clip.source_offset).clamp(0.0, max_offset);
        duration = duration.min((clip.source_duration - offset) / speed);

        // Minimum duration is the final authority; make room by pulling the
        // start back toward the previous neighbor if the next one is too close.
        duration = duration.max(MIN_CLIP_DURATION);
        if let Some(next) = next_start {
            if start + duration > next + TIME_EPSILON {
                start = (next - duration).max(prev_end);
            }
        }

        clip.start_time = start;
        clip.duration = duration;
        clip.source_offset = offset;
        clip.clamp_fades();

        tracing::trace!(clip = %clip_id, start, duration, offset, "Clip trimmed");
        Ok(())
    }

    fn move_clip_with_snap(
        &mut self,
        clip_id: ClipId,
        new_start: f64,
        snap_tolerance: f64,
    ) -> EditResult<f64> {
        let (ti, ci) = self
            .locate(clip_id)
            .ok_or(EditError::ClipNotFound(clip_id))?;
        let track = &mut self.tracks[ti];
        let (prev_end, next_start) = track.neighbor_bounds(ci);
        let clip = &mut track.clips[ci];

        let lo = prev_end.max(0.0);
        let hi = next_start.map(|next| (next - clip.duration).max(lo));
        let proposed = finite_or(new_start, clip.start_time);

        let resolved = if (proposed - lo).abs() <= snap_tolerance {
            lo
        } else if let Some(hi) = hi.filter(|hi| (proposed - hi).abs() <= snap_tolerance) {
            hi
        } else {
            match hi {
                Some(hi) => proposed.clamp(lo, hi),
                None => proposed.max(lo),
            }
        };

        clip.start_time = resolved;
        tracing::trace!(clip = %clip_id, proposed, resolved, "Clip moved");
        Ok(resolved)
    }

    fn add_clip(&mut self, track_id: TrackId, mut clip: Clip) -> EditResult<ClipId> {
        let track = self
            .track_mut(track_id)
            .ok_or(EditError::TrackNotFound(track_id))?;
        let clip_kind = clip.payload.track_kind();
        if clip_kind != track.kind {
            return Err(EditError::KindMismatch {
                clip: clip_kind,
                track: track.kind,
            });
        }

        clip.normalize();
        let mut start = clip.start_time;
        for existing in &track.clips {
            let end = start + clip.duration;
            if start < existing.end_time() - TIME_EPSILON && existing.start_time < end - TIME_EPSILON
            {
                start = existing.end_time();
            }
        }
        clip.start_time = start;

        let id = clip.id;
        track.clips.push(clip);
        track.sort_clips();
        tracing::debug!(track = %track_id, clip = %id, start, "Clip added");
        Ok(id)
    }

    fn delete_clip(&mut self, clip_id: ClipId) -> EditResult<Clip> {
        let (ti, ci) = self
            .locate(clip_id)
            .ok_or(EditError::ClipNotFound(clip_id))?;
        let removed = self.tracks[ti].clips.remove(ci);
        tracing::debug!(clip = %clip_id, "Clip deleted");
        Ok(removed)
    }

    fn add_track(&mut self, kind: TrackKind, name: &str) -> TrackId {
        let name = if name.is_empty() {
            let n = self.tracks.iter().filter(|t| t.kind == kind).count() + 1;
            splice_project_model::default_track_name(kind, n)
        } else {
            name.to_string()
        };
        let track = Track::new(kind, name);
        let id = track.id;
        self.tracks.push(track);
        id
    }

    fn remove_track(&mut self, track_id: TrackId) -> EditResult<Track> {
        let index = self
            .tracks
            .iter()
            .position(|t| t.id == track_id)
            .ok_or(EditError::TrackNotFound(track_id))?;
        Ok(self.tracks.remove(index))
    }

    fn set_fades(&mut self, clip_id: ClipId, fade_in: f64, fade_out: f64) -> EditResult<Fade> {
        let clip = clip_mut(self, clip_id)?;
        clip.fade = Fade {
            fade_in: finite_or(fade_in, 0.0),
            fade_out: finite_or(fade_out, 0.0),
        };
        clip.clamp_fades();
        Ok(clip.fade)
    }

    fn set_transition(
        &mut self,
        clip_id: ClipId,
        transition: Option<Transition>,
    ) -> EditResult<()> {
        clip_mut(self, clip_id)?.transition = transition;
        Ok(())
    }

    fn set_clip_effects(
        &mut self,
        clip_id: ClipId,
        effects: Option<EffectsChain>,
    ) -> EditResult<()> {
        clip_mut(self, clip_id)?.effects = effects.map(|mut e| {
            e.eq = e.eq.clamped();
            e
        });
        Ok(())
    }

    fn set_track_effects(&mut self, track_id: TrackId, mut effects: EffectsChain) -> EditResult<()> {
        effects.eq = effects.eq.clamped();
        self.track_mut(track_id)
            .ok_or(EditError::TrackNotFound(track_id))?
            .effects = effects;
        Ok(())
    }

    fn set_track_mute(&mut self, track_id: TrackId, muted: bool) -> EditResult<()> {
        self.track_mut(track_id)
            .ok_or(EditError::TrackNotFound(track_id))?
            .muted = muted;
        Ok(())
    }

    fn set_track_volume(&mut self, track_id: TrackId, volume: f64) -> EditResult<()> {
        self.track_mut(track_id)
            .ok_or(EditError::TrackNotFound(track_id))?
            .set_volume(volume);
        Ok(())
    }
}

fn clip_mut(timeline: &mut Timeline, clip_id: ClipId) -> EditResult<&mut Clip> {
    let (ti, ci) = timeline
        .locate(clip_id)
        .ok_or(EditError::ClipNotFound(clip_id))?;
    Ok(&mut timeline.tracks[ti].clips[ci])
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Split a note list at clip-relative time `cut`.
///
/// Notes straddling the cut are shortened in the head; the tail only keeps
/// notes that start at or after the cut, shifted to the tail's origin.
fn partition_notes(notes: &[Note], cut: f64) -> (Vec<Note>, Vec<Note>) {
    let mut head = vec![];
    let mut tail = vec![];
    for note in notes {
        if note.start_time < cut {
            let mut n = *note;
            n.duration = n.duration.min(cut - n.start_time);
            head.push(n);
        } else {
            let mut n = *note;
            n.start_time -= cut;
            tail.push(n);
        }
    }
    (head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_project_model::{InstrumentPatch, SourceRef};

    fn audio_timeline(clips: &[(f64, f64)]) -> (Timeline, TrackId, Vec<ClipId>) {
        let mut timeline = Timeline::new();
        let track_id = timeline.add_track(TrackKind::Audio, "dialog");
        let mut ids = vec![];
        for (start, duration) in clips {
            let clip = Clip::audio(SourceRef::new("voice.wav"), *start, *duration, 60.0);
            ids.push(timeline.add_clip(track_id, clip).unwrap());
        }
        (timeline, track_id, ids)
    }

    #[test]
    fn test_split_is_lossless() {
        let mut timeline = Timeline::new();
        let track_id = timeline.add_track(TrackKind::Audio, "");
        let clip = Clip::audio(SourceRef::new("a.wav"), 1.0, 10.0, 30.0).with_offset(2.0);
        let id = timeline.add_clip(track_id, clip).unwrap();

        let (head, tail) = timeline.split_clip(id, 5.0).unwrap().unwrap();
        let head = timeline.clip(head).unwrap();
        let tail = timeline.clip(tail).unwrap();

        assert!((head.duration - 4.0).abs() < 1e-12);
        assert!((tail.duration - 6.0).abs() < 1e-12);
        assert!((head.source_offset - 2.0).abs() < 1e-12);
        assert!((tail.source_offset - 6.0).abs() < 1e-12);
        assert!((head.source_end() - tail.source_offset).abs() < 1e-12);
        assert!((tail.source_end() - 12.0).abs() < 1e-12);
        assert!((tail.start_time - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_split_near_boundary_is_rejected() {
        let (mut timeline, _, ids) = audio_timeline(&[(0.0, 4.0)]);
        let before = timeline.clone();

        assert_eq!(timeline.split_clip(ids[0], 0.05).unwrap(), None);
        assert_eq!(timeline.split_clip(ids[0], 3.95).unwrap(), None);
        assert_eq!(timeline, before);
    }

    #[test]
    fn test_split_keeps_metadata_and_moves_transition_to_tail() {
        let mut timeline = Timeline::new();
        let track_id = timeline.add_track(TrackKind::Video, "main");
        let clip = Clip::video(SourceRef::new("v.mp4"), 0.0, 6.0, 6.0)
            .with_fade(1.0, 1.0)
            .with_effects(EffectsChain::default())
            .with_transition(Transition::new(splice_project_model::TransitionKind::Crossfade));
        let id = timeline.add_clip(track_id, clip).unwrap();

        let (head, tail) = timeline.split_clip(id, 3.0).unwrap().unwrap();
        let head = timeline.clip(head).unwrap();
        let tail = timeline.clip(tail).unwrap();

        assert_eq!(head.fade.fade_in, 1.0);
        assert_eq!(head.fade.fade_out, 0.0);
        assert_eq!(tail.fade.fade_in, 0.0);
        assert_eq!(tail.fade.fade_out, 1.0);
        assert!(head.transition.is_none());
        assert!(tail.transition.is_some());
        assert!(tail.effects.is_some());
        assert_eq!(head.payload, tail.payload);
    }

    #[test]
    fn test_split_partitions_notes() {
        let mut timeline = Timeline::new();
        let track_id = timeline.add_track(TrackKind::Instrument, "keys");
        let notes = vec![
            Note::new(60, 0.0, 1.5, 0.8),
            Note::new(62, 2.0, 0.5, 0.8),
            Note::new(64, 3.0, 0.5, 0.8),
        ];
        let clip = Clip::instrument(notes, InstrumentPatch::default(), 0.0, 4.0);
        let id = timeline.add_clip(track_id, clip).unwrap();

        let (head, tail) = timeline.split_clip(id, 1.0).unwrap().unwrap();
        let head_notes = timeline.clip(head).unwrap().notes().to_vec();
        let tail_notes = timeline.clip(tail).unwrap().notes().to_vec();

        assert_eq!(head_notes.len(), 1);
        assert!((head_notes[0].duration - 1.0).abs() < 1e-12);
        assert_eq!(tail_notes.len(), 2);
        assert!((tail_notes[0].start_time - 1.0).abs() < 1e-12);
        assert!((tail_notes[1].start_time - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_trim_clamps_to_previous_neighbor() {
        let (mut timeline, _, ids) = audio_timeline(&[(0.0, 5.0), (5.0, 3.0)]);

        timeline.trim_clip(ids[1], 4.0, 4.0, 0.0).unwrap();
        let b = timeline.clip(ids[1]).unwrap();
        assert!((b.start_time - 5.0).abs() < 1e-12);
        assert!(timeline.validate().is_empty());
    }

    #[test]
    fn test_trim_shrinks_to_next_neighbor_and_source() {
        let (mut timeline, _, ids) = audio_timeline(&[(0.0, 2.0), (6.0, 2.0)]);

        timeline.trim_clip(ids[0], 0.0, 10.0, 0.0).unwrap();
        assert!((timeline.clip(ids[0]).unwrap().duration - 6.0).abs() < 1e-12);

        timeline.trim_clip(ids[1], 6.0, 10.0, 55.0).unwrap();
        let b = timeline.clip(ids[1]).unwrap();
        assert!((b.duration - 5.0).abs() < 1e-12);
        assert!(b.source_end() <= b.source_duration + 1e-9);
    }

    #[test]
    fn test_trim_enforces_min_duration_last() {
        let (mut timeline, _, ids) = audio_timeline(&[(0.0, 2.0), (2.0, 2.0)]);

        timeline.trim_clip(ids[0], 0.0, 0.01, -3.0).unwrap();
        let a = timeline.clip(ids[0]).unwrap();
        assert!((a.duration - MIN_CLIP_DURATION).abs() < 1e-12);
        assert_eq!(a.source_offset, 0.0);

        // Start pushed flush against the next clip: pulled back to keep 0.1s.
        timeline.trim_clip(ids[0], 1.99, 0.05, 0.0).unwrap();
        let a = timeline.clip(ids[0]).unwrap();
        assert!((a.end_time() - 2.0).abs() < 1e-9);
        assert!(timeline.validate().is_empty());
    }

    #[test]
    fn test_move_snaps_flush_and_clamps() {
        let (mut timeline, _, ids) = audio_timeline(&[(0.0, 2.0), (4.0, 1.0), (8.0, 2.0)]);

        assert!((timeline.move_clip(ids[1], 2.07).unwrap() - 2.0).abs() < 1e-12);
        assert!((timeline.move_clip(ids[1], 6.95).unwrap() - 7.0).abs() < 1e-12);
        assert!((timeline.move_clip(ids[1], 9.5).unwrap() - 7.0).abs() < 1e-12);
        assert!((timeline.move_clip(ids[1], -4.0).unwrap() - 2.0).abs() < 1e-12);
        assert!((timeline.move_clip(ids[1], 5.0).unwrap() - 5.0).abs() < 1e-12);
        assert!(timeline.validate().is_empty());
    }

    #[test]
    fn test_add_clip_resolves_collisions() {
        let (mut timeline, track_id, _) = audio_timeline(&[(0.0, 2.0), (2.5, 2.0)]);
        let clip = Clip::audio(SourceRef::new("sfx.wav"), 1.0, 1.0, 1.0);
        let id = timeline.add_clip(track_id, clip).unwrap();

        assert!((timeline.clip(id).unwrap().start_time - 4.5).abs() < 1e-12);
        assert!(timeline.validate().is_empty());
        assert_eq!(timeline.locate(id), Some((0, 2)));
    }

    #[test]
    fn test_add_clip_rejects_wrong_kind() {
        let (mut timeline, track_id, _) = audio_timeline(&[]);
        let err = timeline
            .add_clip(track_id, Clip::text("title", 0.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, EditError::KindMismatch { .. }));
    }

    #[test]
    fn test_delete_and_remove_track() {
        let (mut timeline, track_id, ids) = audio_timeline(&[(0.0, 1.0), (1.0, 1.0)]);
        timeline.delete_clip(ids[0]).unwrap();
        assert!(timeline.clip(ids[0]).is_none());
        assert!(matches!(
            timeline.delete_clip(ids[0]),
            Err(EditError::ClipNotFound(_))
        ));

        let removed = timeline.remove_track(track_id).unwrap();
        assert_eq!(removed.clips.len(), 1);
        assert!(timeline.tracks.is_empty());
    }

    #[test]
    fn test_set_fades_never_cross() {
        let (mut timeline, _, ids) = audio_timeline(&[(0.0, 3.0)]);
        let fade = timeline.set_fades(ids[0], 2.0, 2.0).unwrap();
        assert_eq!(fade.fade_in, 2.0);
        assert!((fade.fade_out - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_track_settings() {
        let (mut timeline, track_id, _) = audio_timeline(&[]);
        timeline.set_track_mute(track_id, true).unwrap();
        timeline.set_track_volume(track_id, 3.0).unwrap();
        let track = timeline.track(track_id).unwrap();
        assert!(track.muted);
        assert_eq!(track.volume, 1.0);
    }
}
