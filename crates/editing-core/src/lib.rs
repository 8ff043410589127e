//! Splice Editing Core
//!
//! Everything that mutates a [`Timeline`](splice_project_model::Timeline)
//! in response to user input:
//! - **Clip operations:** split, trim, move, add/delete with collision clamping
//! - **Interaction:** pixel-to-time drag sessions for resize and fade handles
//! - **History:** snapshot-based undo/redo with a cursor
//! - **Editor:** the live editing session tying the three together
//!
//! This crate is pure computation: no I/O, no rendering. Constraint
//! violations are clamped to the nearest legal value, never raised.

pub mod clip_ops;
pub mod editor;
pub mod error;
pub mod history;
pub mod interaction;

pub use clip_ops::{ClipOps, SNAP_TOLERANCE_SECS};
pub use editor::{Editor, EditorSettings};
pub use error::{EditError, EditResult};
pub use history::EditHistory;
pub use interaction::{ClipEdit, ClipLayout, DragHandle, DragSession};
