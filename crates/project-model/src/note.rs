//! Notes and instrument patches for instrument clips.

use serde::{Deserialize, Serialize};

/// MIDI pitch of concert A (440 Hz).
pub const A4_PITCH: u8 = 69;

/// A single note inside an instrument clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Semitone index, MIDI convention (0–127).
    pub pitch: u8,
    /// Start time relative to the owning clip's start (seconds).
    pub start_time: f64,
    /// Length in seconds.
    pub duration: f64,
    /// Velocity in `[0.0, 1.0]`.
    pub velocity: f64,
}

impl Note {
    /// Create a note, clamping pitch to 0–127, velocity to `[0, 1]` and
    /// times to non-negative values.
    pub fn new(pitch: u8, start_time: f64, duration: f64, velocity: f64) -> Self {
        Self {
            pitch: pitch.min(127),
            start_time: start_time.max(0.0),
            duration: duration.max(0.0),
            velocity: velocity.clamp(0.0, 1.0),
        }
    }

    /// End time relative to the clip start.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Fundamental frequency of this note in Hz.
    pub fn frequency(&self) -> f64 {
        pitch_to_frequency(self.pitch)
    }
}

/// Equal-tempered frequency of a MIDI pitch: `440 × 2^((pitch − 69) / 12)`.
pub fn pitch_to_frequency(pitch: u8) -> f64 {
    440.0 * 2f64.powf((pitch as f64 - A4_PITCH as f64) / 12.0)
}

/// Oscillator waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Square,
    #[default]
    Sawtooth,
    Triangle,
}

/// Virtual-instrument voice settings: oscillator, ADSR envelope and lowpass filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentPatch {
    pub waveform: Waveform,
    /// Attack time (seconds).
    pub attack: f64,
    /// Decay time (seconds).
    pub decay: f64,
    /// Sustain level as a fraction of velocity.
    pub sustain: f64,
    /// Release time (seconds).
    pub release: f64,
    /// Lowpass cutoff (Hz).
    pub filter_cutoff: f64,
    /// Lowpass resonance (Q).
    pub filter_q: f64,
    /// Output gain applied to every voice.
    pub gain: f64,
}

impl Default for InstrumentPatch {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sawtooth,
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
            filter_cutoff: 2000.0,
            filter_q: 0.707,
            gain: 0.3,
        }
    }
}
