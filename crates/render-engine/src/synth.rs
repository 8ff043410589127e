//! Note synthesizer.
//!
//! A voice is an oscillator through a lowpass filter, shaped by an amplitude
//! envelope expressed as [`ParamAutomation`]. The same voice type serves
//! both scheduling modes: offline renders schedule the whole envelope up
//! front, while [`LiveSynth`] schedules the release only when the note is
//! let go.

use std::collections::HashMap;

use splice_project_model::{pitch_to_frequency, InstrumentPatch, Note, Waveform};

use crate::dsp::{Biquad, BiquadKind};

/// Level an exponential release decays to (exponential ramps cannot reach 0).
pub const RELEASE_FLOOR: f64 = 1e-4;

/// How long a voice keeps running after its release completes.
pub const STOP_PADDING_SECS: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ramp {
    Set,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AutomationEvent {
    time: f64,
    value: f64,
    ramp: Ramp,
}

/// Sample-accurate parameter automation.
///
/// Events are kept sorted by time. A ramp event describes the curve that
/// *ends* at its time, starting from the previous event's value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamAutomation {
    default_value: f64,
    events: Vec<AutomationEvent>,
}

impl ParamAutomation {
    pub fn new(default_value: f64) -> Self {
        Self {
            default_value,
            events: vec![],
        }
    }

    fn insert(&mut self, event: AutomationEvent) {
        let at = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(at, event);
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at(&mut self, value: f64, time: f64) {
        self.insert(AutomationEvent {
            time,
            value,
            ramp: Ramp::Set,
        });
    }

    /// Ramp linearly from the previous event to `value`, arriving at `end_time`.
    pub fn linear_ramp_to(&mut self, value: f64, end_time: f64) {
        self.insert(AutomationEvent {
            time: end_time,
            value,
            ramp: Ramp::Linear,
        });
    }

    /// Ramp exponentially from the previous event to `value`, arriving at
    /// `end_time`. Both endpoints must be positive for the curve to move;
    /// otherwise the previous value holds until `end_time`.
    pub fn exponential_ramp_to(&mut self, value: f64, end_time: f64) {
        self.insert(AutomationEvent {
            time: end_time,
            value,
            ramp: Ramp::Exponential,
        });
    }

    /// Freeze the curve at `time`: drop every event at or after it and pin
    /// the value the curve had there. Returns the held value.
    ///
    /// A ramp in progress at `time` is truncated rather than removed, so the
    /// curve before `time` is unchanged.
    pub fn cancel_and_hold_at(&mut self, time: f64) -> f64 {
        let held = self.value_at(time);
        let cut = self.events.partition_point(|e| e.time < time);
        let ramp = match self.events.get(cut) {
            Some(e) if cut > 0 && e.time > time => e.ramp,
            _ => Ramp::Set,
        };
        self.events.truncate(cut);
        self.insert(AutomationEvent {
            time,
            value: held,
            ramp,
        });
        held
    }

    /// Value of the curve at `time`.
    pub fn value_at(&self, time: f64) -> f64 {
        let next = self.events.partition_point(|e| e.time <= time);
        let (prev_time, prev_value) = match next.checked_sub(1) {
            Some(i) => (self.events[i].time, self.events[i].value),
            None => match self.events.first() {
                // Before any event: a leading ramp starts from the default.
                Some(first) if first.ramp != Ramp::Set => (f64::NEG_INFINITY, self.default_value),
                _ => return self.default_value,
            },
        };

        let Some(upcoming) = self.events.get(next) else {
            return prev_value;
        };
        if !prev_time.is_finite() {
            return prev_value;
        }
        let span = upcoming.time - prev_time;
        if span <= 0.0 {
            return prev_value;
        }
        let frac = (time - prev_time) / span;

        match upcoming.ramp {
            Ramp::Set => prev_value,
            Ramp::Linear => prev_value + (upcoming.value - prev_value) * frac,
            Ramp::Exponential => {
                if prev_value > 0.0 && upcoming.value > 0.0 {
                    prev_value * (upcoming.value / prev_value).powf(frac)
                } else {
                    prev_value
                }
            }
        }
    }

    /// Time of the last scheduled event, if any.
    pub fn last_event_time(&self) -> Option<f64> {
        self.events.last().map(|e| e.time)
    }
}

/// Naive oscillator sample for `phase` in cycles.
fn oscillator(waveform: Waveform, phase: f64) -> f64 {
    let p = phase.fract();
    match waveform {
        Waveform::Sine => (std::f64::consts::TAU * p).sin(),
        Waveform::Square => {
            if p < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Sawtooth => 2.0 * p - 1.0,
        Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
    }
}

/// One sounding note.
#[derive(Debug, Clone)]
pub struct ScheduledVoice {
    frequency: f64,
    waveform: Waveform,
    gain: f64,
    release: f64,
    envelope: ParamAutomation,
    filter: Biquad,
    phase: f64,
    start: f64,
    stop: Option<f64>,
}

impl ScheduledVoice {
    /// Schedule a complete note starting at absolute time `t`.
    ///
    /// Attack and decay run as written; the release starts at
    /// `t + note.duration` from whatever level the envelope reached.
    pub fn schedule(t: f64, note: &Note, patch: &InstrumentPatch, sample_rate: u32) -> Self {
        let mut voice = Self::trigger(t, note.pitch, note.velocity, patch, sample_rate);
        voice.release_at(t + note.duration.max(0.0));
        voice
    }

    /// Start a note whose end is not known yet.
    pub fn trigger(
        t: f64,
        pitch: u8,
        velocity: f64,
        patch: &InstrumentPatch,
        sample_rate: u32,
    ) -> Self {
        let velocity = velocity.clamp(0.0, 1.0);
        let attack = patch.attack.max(0.0);
        let decay = patch.decay.max(0.0);
        let sustain_level = (velocity * patch.sustain.clamp(0.0, 1.0)).max(RELEASE_FLOOR);

        let mut envelope = ParamAutomation::new(0.0);
        envelope.set_value_at(0.0, t);
        envelope.linear_ramp_to(velocity, t + attack);
        envelope.exponential_ramp_to(sustain_level, t + attack + decay);

        Self {
            frequency: pitch_to_frequency(pitch),
            waveform: patch.waveform,
            gain: patch.gain.max(0.0),
            release: patch.release.max(0.0),
            envelope,
            filter: Biquad::new(
                BiquadKind::Lowpass,
                patch.filter_cutoff,
                0.0,
                patch.filter_q,
                sample_rate,
                1,
            ),
            phase: 0.0,
            start: t,
            stop: None,
        }
    }

    /// Begin the release at `t` from the envelope's current value.
    ///
    /// Returns the level the release starts from.
    pub fn release_at(&mut self, t: f64) -> f64 {
        let t = t.max(self.start);
        let level = self.envelope.cancel_and_hold_at(t);
        let release_end = t + self.release;
        self.envelope
            .exponential_ramp_to(RELEASE_FLOOR.min(level), release_end);
        self.stop = Some(release_end + STOP_PADDING_SECS);
        level
    }

    pub fn envelope(&self) -> &ParamAutomation {
        &self.envelope
    }

    pub fn start_time(&self) -> f64 {
        self.start
    }

    /// Time the oscillator stops, once the release is scheduled.
    pub fn stop_time(&self) -> Option<f64> {
        self.stop
    }

    pub fn is_finished_at(&self, t: f64) -> bool {
        self.stop.is_some_and(|stop| t >= stop)
    }

    /// Add this voice into a mono block starting at absolute frame
    /// `first_frame`.
    pub fn render_into(&mut self, out: &mut [f32], first_frame: u64, sample_rate: u32) {
        let sr = sample_rate.max(1) as f64;
        let step = self.frequency / sr;
        for (i, sample) in out.iter_mut().enumerate() {
            let t = (first_frame + i as u64) as f64 / sr;
            if t < self.start || self.is_finished_at(t) {
                continue;
            }
            let raw = oscillator(self.waveform, self.phase);
            self.phase = (self.phase + step).fract();
            let filtered = self.filter.tick(0, raw);
            *sample += (filtered * self.envelope.value_at(t) * self.gain) as f32;
        }
    }
}

/// Real-time note_on / note_off voice manager.
#[derive(Debug, Clone)]
pub struct LiveSynth {
    patch: InstrumentPatch,
    sample_rate: u32,
    voices: HashMap<u64, ScheduledVoice>,
}

impl LiveSynth {
    pub fn new(patch: InstrumentPatch, sample_rate: u32) -> Self {
        Self {
            patch,
            sample_rate,
            voices: HashMap::new(),
        }
    }

    pub fn set_patch(&mut self, patch: InstrumentPatch) {
        self.patch = patch;
    }

    /// Start note `id` at time `t`. Reusing a sounding id replaces that voice.
    pub fn note_on(&mut self, id: u64, pitch: u8, velocity: f64, t: f64) {
        let voice = ScheduledVoice::trigger(t, pitch, velocity, &self.patch, self.sample_rate);
        self.voices.insert(id, voice);
    }

    /// Release note `id` at time `t`.
    ///
    /// Returns the envelope level the release starts from, or `None` when
    /// `id` was never started.
    pub fn note_off(&mut self, id: u64, t: f64) -> Option<f64> {
        let voice = self.voices.get_mut(&id)?;
        Some(voice.release_at(t))
    }

    pub fn voice(&self, id: u64) -> Option<&ScheduledVoice> {
        self.voices.get(&id)
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Mix all voices into a mono block and drop voices that have stopped.
    pub fn render(&mut self, out: &mut [f32], first_frame: u64) {
        for voice in self.voices.values_mut() {
            voice.render_into(out, first_frame, self.sample_rate);
        }
        let end = (first_frame + out.len() as u64) as f64 / self.sample_rate.max(1) as f64;
        self.voices.retain(|_, v| !v.is_finished_at(end));
    }
}
