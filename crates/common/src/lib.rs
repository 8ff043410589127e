//! Splice Common Utilities
//!
//! Shared infrastructure for all Splice crates:
//! - Error types and result aliases
//! - Time conversions between seconds, sample frames, video frames, and beats
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use config::*;
pub use error::*;
pub use time::*;
