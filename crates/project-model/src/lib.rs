//! Splice Project Model
//!
//! Defines the core data contracts for Splice projects:
//! - **Tracks & Clips:** time-ordered, non-overlapping clip sequences per track
//! - **Notes & Patches:** note sequences and synth settings for instrument clips
//! - **Effects & Transitions:** per-track/per-clip EQ + compressor, trailing-edge transitions
//! - **Timeline:** the full editable arrangement and its invariant checks
//! - **Project:** top-level metadata, export configuration, and on-disk layout
//!
//! All times are `f64` seconds. Timeline positions are absolute; note times
//! are relative to their clip's start.

pub mod clip;
pub mod effects;
pub mod note;
pub mod project;
pub mod timeline;
pub mod track;
pub mod transition;

pub use clip::*;
pub use effects::*;
pub use note::*;
pub use project::*;
pub use timeline::*;
pub use track::*;
pub use transition::*;
