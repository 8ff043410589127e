//! Editing errors.
//!
//! Only lookups fail. Out-of-range values are clamped by the operations
//! themselves and never reach this type.

use splice_project_model::{ClipId, TrackId, TrackKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("Clip not found: {0}")]
    ClipNotFound(ClipId),

    #[error("A {clip:?} clip cannot be placed on a {track:?} track")]
    KindMismatch { clip: TrackKind, track: TrackKind },
}

pub type EditResult<T> = Result<T, EditError>;

impl From<EditError> for splice_common::SpliceError {
    fn from(err: EditError) -> Self {
        splice_common::SpliceError::edit(err.to_string())
    }
}
