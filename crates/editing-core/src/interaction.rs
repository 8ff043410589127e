//! Pointer interaction: hit-testing clip handles and turning drags into edits.
//!
//! A drag starts with [`DragSession::begin`], which snapshots the clip as it
//! was under the pointer. Every pointer move is reduced against that
//! snapshot, never against the previous move, so rounding does not
//! accumulate over a long drag.

use splice_project_model::{Clip, ClipId, Timeline, MIN_CLIP_DURATION};

use crate::clip_ops::ClipOps;
use crate::error::EditResult;

/// Pixel distance within which a pointer grabs an edge or fade marker.
pub const HANDLE_TOLERANCE_PX: f64 = 10.0;

/// What part of a clip the pointer grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragHandle {
    ResizeStart,
    ResizeEnd,
    FadeIn,
    FadeOut,
    Move,
}

/// On-screen placement of a clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipLayout {
    /// Left edge in pixels.
    pub x: f64,
    /// Width in pixels.
    pub width: f64,
}

impl ClipLayout {
    pub fn new(x: f64, width: f64) -> Self {
        Self { x, width }
    }

    /// Horizontal zoom implied by this layout for `clip`.
    pub fn pixels_per_second(&self, clip: &Clip) -> f64 {
        if clip.duration > 0.0 && self.width > 0.0 {
            self.width / clip.duration
        } else {
            1.0
        }
    }
}

/// Decide which handle the pointer is over.
///
/// Edges win over fade markers, and fade markers win over the body.
pub fn hit_test(layout: ClipLayout, clip: &Clip, pointer_x: f64, tolerance_px: f64) -> DragHandle {
    let pps = layout.pixels_per_second(clip);
    let left = layout.x;
    let right = layout.x + layout.width;
    let fade_in_x = left + clip.fade.fade_in * pps;
    let fade_out_x = right - clip.fade.fade_out * pps;

    let near = |edge: f64| (pointer_x - edge).abs() <= tolerance_px;

    if near(left) {
        DragHandle::ResizeStart
    } else if near(right) {
        DragHandle::ResizeEnd
    } else if near(fade_in_x) {
        DragHandle::FadeIn
    } else if near(fade_out_x) {
        DragHandle::FadeOut
    } else {
        DragHandle::Move
    }
}

/// The edit a drag currently proposes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipEdit {
    Trim {
        start: f64,
        duration: f64,
        offset: f64,
    },
    Move {
        start: f64,
    },
    Fades {
        fade_in: f64,
        fade_out: f64,
    },
}

impl ClipEdit {
    /// Apply through the collision-safe clip operations.
    pub fn apply(self, timeline: &mut Timeline, clip_id: ClipId) -> EditResult<()> {
        match self {
            ClipEdit::Trim {
                start,
                duration,
                offset,
            } => timeline.trim_clip(clip_id, start, duration, offset),
            ClipEdit::Move { start } => timeline.move_clip(clip_id, start).map(|_| ()),
            ClipEdit::Fades { fade_in, fade_out } => {
                timeline.set_fades(clip_id, fade_in, fade_out).map(|_| ())
            }
        }
    }
}

/// An in-progress pointer drag on one clip.
#[derive(Debug, Clone)]
pub struct DragSession {
    handle: DragHandle,
    original: Clip,
    pointer_origin: f64,
    pixels_per_second: f64,
    left_bound: f64,
}

impl DragSession {
    /// Start a drag at `pointer_x` with the clip's current state.
    pub fn begin(handle: DragHandle, clip: &Clip, pointer_x: f64, pixels_per_second: f64) -> Self {
        let pixels_per_second = if pixels_per_second.is_finite() && pixels_per_second > 0.0 {
            pixels_per_second
        } else {
            1.0
        };
        Self {
            handle,
            original: clip.clone(),
            pointer_origin: pointer_x,
            pixels_per_second,
            left_bound: 0.0,
        }
    }

    /// Earliest time the clip's left edge may reach, usually the end of the
    /// previous clip on the track.
    pub fn with_left_bound(mut self, left_bound: f64) -> Self {
        if left_bound.is_finite() {
            self.left_bound = left_bound.clamp(0.0, self.original.start_time);
        }
        self
    }

    pub fn handle(&self) -> DragHandle {
        self.handle
    }

    pub fn clip_id(&self) -> ClipId {
        self.original.id
    }

    /// Clip state captured when the drag began.
    pub fn original(&self) -> &Clip {
        &self.original
    }

    /// Pointer displacement converted to seconds.
    pub fn delta_time(&self, pointer_x: f64) -> f64 {
        (pointer_x - self.pointer_origin) / self.pixels_per_second
    }

    /// Proposed edit for the pointer at `pointer_x`.
    pub fn reduce(&self, pointer_x: f64) -> ClipEdit {
        let c = &self.original;
        let dt = self.delta_time(pointer_x);

        match self.handle {
            DragHandle::ResizeStart => {
                // Keep the right edge fixed: the start, offset and duration
                // all derive from the same clamped delta.
                let dt = dt
                    .min(c.duration - MIN_CLIP_DURATION)
                    .max(-c.source_offset / c.speed)
                    .max(self.left_bound - c.start_time);
                ClipEdit::Trim {
                    start: c.start_time + dt,
                    duration: c.duration - dt,
                    offset: c.source_offset + dt * c.speed,
                }
            }
            DragHandle::ResizeEnd => {
                let duration = (c.duration + dt)
                    .min(c.max_duration())
                    .max(MIN_CLIP_DURATION);
                ClipEdit::Trim {
                    start: c.start_time,
                    duration,
                    offset: c.source_offset,
                }
            }
            DragHandle::FadeIn => {
                let limit = (c.duration - c.fade.fade_out).max(0.0);
                ClipEdit::Fades {
                    fade_in: (c.fade.fade_in + dt).clamp(0.0, limit),
                    fade_out: c.fade.fade_out,
                }
            }
            DragHandle::FadeOut => {
                let limit = (c.duration - c.fade.fade_in).max(0.0);
                ClipEdit::Fades {
                    fade_in: c.fade.fade_in,
                    fade_out: (c.fade.fade_out - dt).clamp(0.0, limit),
                }
            }
            DragHandle::Move => ClipEdit::Move {
                start: (c.start_time + dt).max(0.0),
            },
        }
    }
}
