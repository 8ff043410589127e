//! Live editing session: a timeline, its undo history, and the active drag.

use splice_common::config::EditorDefaults;
use splice_project_model::{
    Clip, ClipId, Fade, Timeline, Track, TrackId, TrackKind, Transition,
};

use crate::clip_ops::ClipOps;
use crate::error::{EditError, EditResult};
use crate::history::EditHistory;
use crate::interaction::{hit_test, ClipLayout, DragHandle, DragSession};

/// Tunables for an editing session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorSettings {
    pub snap_tolerance: f64,
    pub handle_tolerance_px: f64,
    pub history_capacity: usize,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self::from(&EditorDefaults::default())
    }
}

impl From<&EditorDefaults> for EditorSettings {
    fn from(defaults: &EditorDefaults) -> Self {
        Self {
            snap_tolerance: defaults.snap_tolerance_secs.max(0.0),
            handle_tolerance_px: defaults.handle_tolerance_px.max(0.0),
            history_capacity: match defaults.history_capacity {
                0 => usize::MAX,
                n => n,
            },
        }
    }
}

/// Owns the timeline being edited.
///
/// Discrete operations commit one history entry each. A drag updates the
/// timeline live and commits once when it ends. Undo and redo swap in a
/// snapshot by value and never commit.
#[derive(Debug)]
pub struct Editor {
    timeline: Timeline,
    history: EditHistory<Vec<Track>>,
    drag: Option<DragSession>,
    settings: EditorSettings,
}

impl Editor {
    pub fn new(timeline: Timeline, settings: EditorSettings) -> Self {
        let history = EditHistory::new(timeline.tracks.clone(), settings.history_capacity);
        Self {
            timeline,
            history,
            drag: None,
            settings,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn into_timeline(self) -> Timeline {
        self.timeline
    }

    pub fn settings(&self) -> EditorSettings {
        self.settings
    }

    pub fn history(&self) -> &EditHistory<Vec<Track>> {
        &self.history
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Run an operation against the timeline and commit the result.
    pub fn perform<R>(
        &mut self,
        op: impl FnOnce(&mut Timeline) -> EditResult<R>,
    ) -> EditResult<R> {
        let result = op(&mut self.timeline)?;
        self.commit_update();
        Ok(result)
    }

    /// Record the current tracks as a new history entry.
    ///
    /// Ignored when nothing changed. Returns whether an entry was recorded.
    pub fn commit_update(&mut self) -> bool {
        if *self.history.current() == self.timeline.tracks {
            return false;
        }
        self.history.push(self.timeline.tracks.clone());
        tracing::trace!(cursor = self.history.cursor(), "History entry committed");
        true
    }

    pub fn undo(&mut self) -> bool {
        self.cancel_drag();
        match self.history.undo() {
            Some(snapshot) => {
                self.restore(&snapshot);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_drag();
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(&snapshot);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn restore(&mut self, snapshot: &[Track]) {
        self.timeline.tracks = snapshot.to_vec();
    }

    pub fn add_track(&mut self, kind: TrackKind, name: &str) -> TrackId {
        let id = self.timeline.add_track(kind, name);
        self.commit_update();
        id
    }

    pub fn remove_track(&mut self, track_id: TrackId) -> EditResult<Track> {
        self.perform(|t| t.remove_track(track_id))
    }

    pub fn add_clip(&mut self, track_id: TrackId, clip: Clip) -> EditResult<ClipId> {
        self.perform(|t| t.add_clip(track_id, clip))
    }

    pub fn delete_clip(&mut self, clip_id: ClipId) -> EditResult<Clip> {
        self.perform(|t| t.delete_clip(clip_id))
    }

    pub fn split_clip(&mut self, clip_id: ClipId, at: f64) -> EditResult<Option<(ClipId, ClipId)>> {
        self.perform(|t| t.split_clip(clip_id, at))
    }

    pub fn trim_clip(
        &mut self,
        clip_id: ClipId,
        new_start: f64,
        new_duration: f64,
        new_offset: f64,
    ) -> EditResult<()> {
        self.perform(|t| t.trim_clip(clip_id, new_start, new_duration, new_offset))
    }

    pub fn move_clip(&mut self, clip_id: ClipId, new_start: f64) -> EditResult<f64> {
        let tolerance = self.settings.snap_tolerance;
        self.perform(|t| t.move_clip_with_snap(clip_id, new_start, tolerance))
    }

    pub fn set_fades(&mut self, clip_id: ClipId, fade_in: f64, fade_out: f64) -> EditResult<Fade> {
        self.perform(|t| t.set_fades(clip_id, fade_in, fade_out))
    }

    pub fn set_transition(
        &mut self,
        clip_id: ClipId,
        transition: Option<Transition>,
    ) -> EditResult<()> {
        self.perform(|t| t.set_transition(clip_id, transition))
    }

    pub fn set_track_mute(&mut self, track_id: TrackId, muted: bool) -> EditResult<()> {
        self.perform(|t| t.set_track_mute(track_id, muted))
    }

    pub fn set_track_volume(&mut self, track_id: TrackId, volume: f64) -> EditResult<()> {
        self.perform(|t| t.set_track_volume(track_id, volume))
    }

    /// Start dragging whatever handle of `clip_id` lies under `pointer_x`.
    pub fn begin_drag(
        &mut self,
        clip_id: ClipId,
        layout: ClipLayout,
        pointer_x: f64,
    ) -> EditResult<DragHandle> {
        let (ti, ci) = self
            .timeline
            .locate(clip_id)
            .ok_or(EditError::ClipNotFound(clip_id))?;
        let track = &self.timeline.tracks[ti];
        let clip = &track.clips[ci];
        let (prev_end, _) = track.neighbor_bounds(ci);
        let handle = hit_test(layout, clip, pointer_x, self.settings.handle_tolerance_px);
        let session = DragSession::begin(handle, clip, pointer_x, layout.pixels_per_second(clip))
            .with_left_bound(prev_end);
        self.drag = Some(session);
        tracing::trace!(clip = %clip_id, ?handle, "Drag started");
        Ok(handle)
    }

    /// Apply the drag for a new pointer position without committing.
    pub fn drag_to(&mut self, pointer_x: f64) -> EditResult<()> {
        let Some(session) = &self.drag else {
            return Ok(());
        };
        let edit = session.reduce(pointer_x);
        edit.apply(&mut self.timeline, session.clip_id())
    }

    /// Finish the drag with a single history entry.
    pub fn end_drag(&mut self) -> bool {
        if self.drag.take().is_none() {
            return false;
        }
        self.commit_update()
    }

    /// Abandon the drag and put the timeline back as it was.
    pub fn cancel_drag(&mut self) {
        if self.drag.take().is_some() {
            let snapshot = self.history.current();
            self.restore(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_project_model::SourceRef;

    fn editor_with_clip() -> (Editor, TrackId, ClipId) {
        let mut editor = Editor::new(Timeline::new(), EditorSettings::default());
        let track = editor.add_track(TrackKind::Audio, "voice");
        let clip = editor
            .add_clip(track, Clip::audio(SourceRef::new("v.wav"), 0.0, 4.0, 10.0))
            .unwrap();
        (editor, track, clip)
    }

    #[test]
    fn test_undo_then_redo_restores_state() {
        let (mut editor, _, clip) = editor_with_clip();
        editor.split_clip(clip, 2.0).unwrap();
        let after_split = editor.timeline().clone();

        assert!(editor.undo());
        assert_eq!(editor.timeline().clip_count(), 1);
        assert!(editor.redo());
        assert_eq!(editor.timeline(), &after_split);
    }

    #[test]
    fn test_undo_and_redo_do_not_commit() {
        let (mut editor, _, clip) = editor_with_clip();
        editor.move_clip(clip, 2.0).unwrap();
        let len = editor.history().len();

        assert!(editor.undo());
        assert!(!editor.commit_update());
        assert_eq!(editor.history().len(), len);
        assert!(editor.can_redo());

        assert!(editor.redo());
        assert!(!editor.commit_update());
        assert_eq!(editor.history().len(), len);
        assert_eq!(editor.timeline().clip(clip).unwrap().start_time, 2.0);
    }

    #[test]
    fn test_edit_after_undo_discards_redo() {
        let (mut editor, _, clip) = editor_with_clip();
        editor.move_clip(clip, 3.0).unwrap();
        editor.undo();
        editor.set_fades(clip, 0.5, 0.5).unwrap();
        assert!(!editor.can_redo());
    }

    #[test]
    fn test_noop_edit_is_not_committed() {
        let (mut editor, _, clip) = editor_with_clip();
        let len = editor.history().len();
        editor.split_clip(clip, 0.01).unwrap();
        editor.move_clip(clip, 0.0).unwrap();
        assert_eq!(editor.history().len(), len);
    }

    #[test]
    fn test_drag_commits_once() {
        let (mut editor, _, clip) = editor_with_clip();
        let len = editor.history().len();
        let layout = ClipLayout::new(0.0, 400.0);

        let handle = editor.begin_drag(clip, layout, 398.0).unwrap();
        assert_eq!(handle, DragHandle::ResizeEnd);
        for x in [350.0, 300.0, 250.0, 200.0] {
            editor.drag_to(x).unwrap();
        }
        assert!(editor.end_drag());

        assert_eq!(editor.history().len(), len + 1);
        let c = editor.timeline().clip(clip).unwrap();
        assert!((c.duration - 2.02).abs() < 1e-9);

        editor.undo();
        assert!((editor.timeline().clip(clip).unwrap().duration - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_resize_start_into_neighbor_keeps_end_pinned() {
        let mut editor = Editor::new(Timeline::new(), EditorSettings::default());
        let track = editor.add_track(TrackKind::Audio, "music");
        editor
            .add_clip(track, Clip::audio(SourceRef::new("a.wav"), 0.0, 2.0, 10.0))
            .unwrap();
        let b = editor
            .add_clip(
                track,
                Clip::audio(SourceRef::new("b.wav"), 3.0, 2.0, 20.0).with_offset(5.0),
            )
            .unwrap();

        let handle = editor
            .begin_drag(b, ClipLayout::new(300.0, 200.0), 300.0)
            .unwrap();
        assert_eq!(handle, DragHandle::ResizeStart);
        editor.drag_to(100.0).unwrap();
        assert!(editor.end_drag());

        let c = editor.timeline().clip(b).unwrap();
        assert!((c.start_time - 2.0).abs() < 1e-9);
        assert!((c.end_time() - 5.0).abs() < 1e-9);
        assert!((c.source_offset - 4.0).abs() < 1e-9);
        assert!(editor.timeline().validate().is_empty());
    }

    #[test]
    fn test_cancel_drag_restores() {
        let (mut editor, _, clip) = editor_with_clip();
        editor
            .begin_drag(clip, ClipLayout::new(0.0, 400.0), 200.0)
            .unwrap();
        editor.drag_to(600.0).unwrap();
        assert!((editor.timeline().clip(clip).unwrap().start_time - 4.0).abs() < 1e-9);

        editor.cancel_drag();
        assert_eq!(editor.timeline().clip(clip).unwrap().start_time, 0.0);
        assert!(!editor.is_dragging());
    }

    #[test]
    fn test_unknown_ids_are_errors() {
        let (mut editor, _, _) = editor_with_clip();
        let missing = uuid_like();
        assert!(matches!(
            editor.delete_clip(missing),
            Err(EditError::ClipNotFound(_))
        ));
        assert!(matches!(
            editor.set_track_mute(missing, true),
            Err(EditError::TrackNotFound(_))
        ));
    }

    fn uuid_like() -> ClipId {
        Clip::text("x", 0.0, 1.0).id
    }

    #[test]
    fn test_zero_capacity_means_unbounded() {
        let defaults = EditorDefaults {
            history_capacity: 0,
            ..EditorDefaults::default()
        };
        assert_eq!(EditorSettings::from(&defaults).history_capacity, usize::MAX);
    }
}
