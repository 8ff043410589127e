//! Timeline time conversions.
//!
//! All timeline positions are `f64` seconds. Rendering works in integer
//! sample frames (audio) or frame indices (video); these helpers keep the
//! rounding rules in one place so audio and video agree on where a clip
//! starts.

/// Convert seconds to a sample-frame index (rounded to nearest).
pub fn secs_to_frames(secs: f64, sample_rate: u32) -> u64 {
    (secs.max(0.0) * sample_rate as f64).round() as u64
}

/// Convert a sample-frame index to seconds.
pub fn frames_to_secs(frames: u64, sample_rate: u32) -> f64 {
    frames as f64 / sample_rate.max(1) as f64
}

/// Duration of one beat in seconds at the given tempo.
///
/// Non-positive tempos fall back to 120 BPM.
pub fn beat_duration(bpm: f64) -> f64 {
    let bpm = if bpm.is_finite() && bpm > 0.0 { bpm } else { 120.0 };
    60.0 / bpm
}

/// Maps video frame indices to timeline seconds at a fixed rate.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    fps: u32,
}

impl FrameClock {
    /// Create a clock at `fps` frames per second (minimum 1).
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    /// Frames per second.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Timeline time of the given frame index.
    pub fn time_of(&self, frame: u64) -> f64 {
        frame as f64 / self.fps as f64
    }

    /// Number of frames needed to cover `duration_secs`.
    pub fn frame_count(&self, duration_secs: f64) -> u64 {
        (duration_secs.max(0.0) * self.fps as f64).ceil() as u64
    }
}
