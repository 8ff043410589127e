//! Effect settings shared by tracks and clips.
//!
//! These are parameter records only; the DSP that realizes them lives in
//! the render engine.

use serde::{Deserialize, Serialize};

/// Corner frequency of the low-shelf EQ stage (Hz).
pub const EQ_LOW_SHELF_HZ: f64 = 320.0;
/// Center frequency of the peaking EQ stage (Hz).
pub const EQ_MID_PEAK_HZ: f64 = 1000.0;
/// Corner frequency of the high-shelf EQ stage (Hz).
pub const EQ_HIGH_SHELF_HZ: f64 = 3200.0;

/// Gain limit accepted for each EQ band (dB).
pub const EQ_GAIN_LIMIT_DB: f64 = 24.0;

/// Three-band equalizer gains in dB.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreeBandEq {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

impl ThreeBandEq {
    /// All bands at unity.
    pub const FLAT: ThreeBandEq = ThreeBandEq {
        low: 0.0,
        mid: 0.0,
        high: 0.0,
    };

    /// Whether every band is (effectively) at 0 dB.
    pub fn is_flat(&self) -> bool {
        self.low.abs() < 1e-9 && self.mid.abs() < 1e-9 && self.high.abs() < 1e-9
    }

    /// Copy with every band clamped to the accepted gain range.
    pub fn clamped(self) -> Self {
        Self {
            low: self.low.clamp(-EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB),
            mid: self.mid.clamp(-EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB),
            high: self.high.clamp(-EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB),
        }
    }
}

/// Dynamics compressor settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorSettings {
    /// Whether the compressor stage is inserted into the chain.
    pub active: bool,
    /// Threshold in dBFS.
    pub threshold: f64,
    /// Compression ratio (`ratio:1`), at least 1.
    pub ratio: f64,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            active: false,
            threshold: -24.0,
            ratio: 4.0,
        }
    }
}

/// EQ followed by an optional compressor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsChain {
    pub eq: ThreeBandEq,
    pub compressor: CompressorSettings,
}

impl EffectsChain {
    /// Whether the chain leaves the signal untouched.
    pub fn is_neutral(&self) -> bool {
        self.eq.is_flat() && !self.compressor.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_is_neutral() {
        let chain = EffectsChain::default();
        assert!(chain.is_neutral());
        assert!(!chain.compressor.active);
    }

    #[test]
    fn test_active_compressor_is_not_neutral() {
        let mut chain = EffectsChain::default();
        chain.compressor.active = true;
        assert!(!chain.is_neutral());
    }

    #[test]
    fn test_eq_clamping() {
        let eq = ThreeBandEq {
            low: 40.0,
            mid: -3.0,
            high: -90.0,
        }
        .clamped();
        assert_eq!(eq.low, EQ_GAIN_LIMIT_DB);
        assert_eq!(eq.mid, -3.0);
        assert_eq!(eq.high, -EQ_GAIN_LIMIT_DB);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let chain: EffectsChain = serde_json::from_str(r#"{"eq":{"low":3.0}}"#).unwrap();
        assert_eq!(chain.eq.low, 3.0);
        assert_eq!(chain.eq.mid, 0.0);
        assert_eq!(chain.compressor.ratio, 4.0);
    }
}
