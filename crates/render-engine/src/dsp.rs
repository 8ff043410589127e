//! Signal processing blocks: biquad filters, the three-band EQ, and the
//! feed-forward compressor used on tracks and clips.
//!
//! All processors work on interleaved `f32` buffers and keep independent
//! state per channel.

use splice_project_model::{
    CompressorSettings, EffectsChain, ThreeBandEq, EQ_GAIN_LIMIT_DB, EQ_HIGH_SHELF_HZ,
    EQ_LOW_SHELF_HZ, EQ_MID_PEAK_HZ,
};

/// Q used for the EQ bands.
const EQ_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

const COMPRESSOR_ATTACK_SECS: f64 = 0.003;
const COMPRESSOR_RELEASE_SECS: f64 = 0.25;
const COMPRESSOR_KNEE_DB: f64 = 6.0;

pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

pub fn linear_to_db(linear: f64) -> f64 {
    if linear > 1e-10 {
        20.0 * linear.log10()
    } else {
        -200.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    Lowpass,
    Peak,
    LowShelf,
    HighShelf,
}

#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

/// Biquad filter, Direct Form II Transposed, RBJ cookbook coefficients.
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    state: Vec<BiquadState>,
}

impl Biquad {
    pub fn new(
        kind: BiquadKind,
        frequency: f64,
        gain_db: f64,
        q: f64,
        sample_rate: u32,
        channels: usize,
    ) -> Self {
        let fs = sample_rate.max(1) as f64;
        let f0 = frequency.clamp(10.0, fs * 0.49);
        let q = q.clamp(0.1, 18.0);
        let a = 10f64.powf(gain_db.clamp(-EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB) / 40.0);
        let w0 = std::f64::consts::TAU * f0 / fs;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            BiquadKind::Lowpass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            BiquadKind::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            BiquadKind::LowShelf => {
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - k),
                    (a + 1.0) + (a - 1.0) * cos_w0 + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - k,
                )
            }
            BiquadKind::HighShelf => {
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - k),
                    (a + 1.0) - (a - 1.0) * cos_w0 + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - k,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            state: vec![BiquadState::default(); channels.max(1)],
        }
    }

    #[inline]
    pub fn tick(&mut self, channel: usize, x: f64) -> f64 {
        let s = &mut self.state[channel];
        let y = self.b0 * x + s.z1;
        s.z1 = self.b1 * x - self.a1 * y + s.z2;
        s.z2 = self.b2 * x - self.a2 * y;
        y
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        let channels = self.state.len();
        for frame in buffer.chunks_exact_mut(channels) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample = self.tick(ch, *sample as f64) as f32;
            }
        }
    }
}

/// Low shelf, mid peak, high shelf at fixed frequencies.
#[derive(Debug, Clone)]
pub struct EqProcessor {
    bands: Vec<Biquad>,
}

impl EqProcessor {
    pub fn new(eq: &ThreeBandEq, sample_rate: u32, channels: usize) -> Self {
        let eq = eq.clamped();
        let mut bands = vec![];
        for (kind, freq, gain) in [
            (BiquadKind::LowShelf, EQ_LOW_SHELF_HZ, eq.low),
            (BiquadKind::Peak, EQ_MID_PEAK_HZ, eq.mid),
            (BiquadKind::HighShelf, EQ_HIGH_SHELF_HZ, eq.high),
        ] {
            // Flat bands are skipped entirely.
            if gain != 0.0 {
                bands.push(Biquad::new(kind, freq, gain, EQ_Q, sample_rate, channels));
            }
        }
        Self { bands }
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        for band in &mut self.bands {
            band.process(buffer);
        }
    }
}

/// Feed-forward peak compressor with a soft knee and linked channels.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f64,
    ratio: f64,
    attack_coeff: f64,
    release_coeff: f64,
    envelope: f64,
    channels: usize,
}

impl Compressor {
    pub fn new(settings: &CompressorSettings, sample_rate: u32, channels: usize) -> Self {
        let fs = sample_rate.max(1) as f64;
        Self {
            threshold_db: settings.threshold.clamp(-100.0, 0.0),
            ratio: settings.ratio.clamp(1.0, 20.0),
            attack_coeff: (-1.0 / (COMPRESSOR_ATTACK_SECS * fs)).exp(),
            release_coeff: (-1.0 / (COMPRESSOR_RELEASE_SECS * fs)).exp(),
            envelope: 0.0,
            channels: channels.max(1),
        }
    }

    /// Gain reduction in dB for a detector level.
    fn gain_reduction(&self, input_db: f64) -> f64 {
        let half_knee = COMPRESSOR_KNEE_DB / 2.0;
        let slope = 1.0 - 1.0 / self.ratio;
        if input_db < self.threshold_db - half_knee {
            0.0
        } else if input_db > self.threshold_db + half_knee {
            (input_db - self.threshold_db) * slope
        } else {
            let k = input_db - self.threshold_db + half_knee;
            k * k / (2.0 * COMPRESSOR_KNEE_DB) * slope
        }
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(self.channels) {
            let detect = frame.iter().fold(0.0f64, |m, s| m.max(s.abs() as f64));
            let coeff = if detect > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * detect;

            let gain = db_to_linear(-self.gain_reduction(linear_to_db(self.envelope))) as f32;
            for s in frame.iter_mut() {
                *s *= gain;
            }
        }
    }
}

/// EQ followed by an optional compressor.
#[derive(Debug, Clone)]
pub struct ChannelStrip {
    eq: EqProcessor,
    compressor: Option<Compressor>,
}

impl ChannelStrip {
    pub fn new(chain: &EffectsChain, sample_rate: u32, channels: usize) -> Self {
        Self {
            eq: EqProcessor::new(&chain.eq, sample_rate, channels),
            compressor: chain
                .compressor
                .active
                .then(|| Compressor::new(&chain.compressor, sample_rate, channels)),
        }
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        self.eq.process(buffer);
        if let Some(comp) = &mut self.compressor {
            comp.process(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (std::f64::consts::TAU * freq * i as f64 / sample_rate as f64).sin() as f32 * 0.5)
            .collect()
    }

    fn rms(buf: &[f32]) -> f64 {
        (buf.iter().map(|s| (*s as f64).powi(2)).sum::<f64>() / buf.len() as f64).sqrt()
    }

    #[test]
    fn test_lowpass_attenuates_highs() {
        let sr = 44_100;
        let mut high = sine(10_000.0, sr, 4_410);
        let mut low = sine(100.0, sr, 4_410);
        let before_high = rms(&high);
        let before_low = rms(&low);

        Biquad::new(BiquadKind::Lowpass, 500.0, 0.0, 0.707, sr, 1).process(&mut high);
        Biquad::new(BiquadKind::Lowpass, 500.0, 0.0, 0.707, sr, 1).process(&mut low);

        assert!(rms(&high) < before_high * 0.1);
        assert!((rms(&low) / before_low - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_flat_eq_is_identity() {
        let mut buf = sine(440.0, 48_000, 480);
        let original = buf.clone();
        EqProcessor::new(&ThreeBandEq::FLAT, 48_000, 1).process(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn test_low_shelf_boost_raises_bass() {
        let sr = 48_000;
        let mut buf = sine(60.0, sr, 48_000);
        let before = rms(&buf[24_000..]);
        let eq = ThreeBandEq {
            low: 6.0,
            mid: 0.0,
            high: 0.0,
        };
        EqProcessor::new(&eq, sr, 1).process(&mut buf);
        let gain_db = linear_to_db(rms(&buf[24_000..]) / before);
        assert!((gain_db - 6.0).abs() < 1.0, "gain {gain_db}");
    }

    #[test]
    fn test_compressor_reduces_loud_signal() {
        let settings = CompressorSettings {
            active: true,
            threshold: -24.0,
            ratio: 4.0,
        };
        let mut comp = Compressor::new(&settings, 44_100, 2);
        let mut buf = vec![0.9f32; 44_100 * 2];
        comp.process(&mut buf);
        let tail = buf[buf.len() - 2];
        // -0.9 dBFS, 23 dB over threshold, 4:1 -> about 17 dB of reduction.
        assert!(tail < 0.2, "tail {tail}");
        assert!(tail > 0.05);
    }

    #[test]
    fn test_inactive_compressor_is_skipped() {
        let chain = EffectsChain::default();
        let mut strip = ChannelStrip::new(&chain, 44_100, 2);
        let mut buf = vec![0.9f32; 64];
        strip.process(&mut buf);
        assert!(buf.iter().all(|s| *s == 0.9));
    }
}
