//! Visual transitions attached to a clip's trailing edge.

use serde::{Deserialize, Serialize};

/// Kind of visual transition between two adjacent clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionKind {
    Cut,
    Crossfade,
    Zoom,
    Slide,
    WhipPan,
    Glitch,
    FadeToBlack,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 7] = [
        TransitionKind::Cut,
        TransitionKind::Crossfade,
        TransitionKind::Zoom,
        TransitionKind::Slide,
        TransitionKind::WhipPan,
        TransitionKind::Glitch,
        TransitionKind::FadeToBlack,
    ];

    /// Canonical length of this transition in beats.
    pub fn beat_fraction(self) -> f64 {
        match self {
            TransitionKind::Cut => 0.0,
            TransitionKind::WhipPan => 0.25,
            TransitionKind::Glitch => 0.125,
            TransitionKind::Zoom | TransitionKind::Slide => 0.5,
            TransitionKind::Crossfade => 1.0,
            TransitionKind::FadeToBlack => 2.0,
        }
    }

    /// Fixed duration used when no tempo is supplied (seconds).
    pub fn default_duration(self) -> f64 {
        match self {
            TransitionKind::Cut => 0.0,
            TransitionKind::WhipPan => 0.25,
            TransitionKind::Glitch => 0.3,
            TransitionKind::Zoom | TransitionKind::Slide => 0.5,
            TransitionKind::Crossfade | TransitionKind::FadeToBlack => 1.0,
        }
    }

    /// Duration in seconds for this kind at the given tempo.
    pub fn duration_at_bpm(self, bpm: f64) -> f64 {
        let bpm = if bpm.is_finite() && bpm > 0.0 { bpm } else { 120.0 };
        self.beat_fraction() * 60.0 / bpm
    }

    /// Parse the persisted camelCase name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cut" => Some(Self::Cut),
            "crossfade" => Some(Self::Crossfade),
            "zoom" => Some(Self::Zoom),
            "slide" => Some(Self::Slide),
            "whipPan" => Some(Self::WhipPan),
            "glitch" => Some(Self::Glitch),
            "fadeToBlack" => Some(Self::FadeToBlack),
            _ => None,
        }
    }
}

/// Progress easing curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    /// `t²`
    EaseIn,
    /// `t(2 − t)`
    EaseOut,
    /// Piecewise cubic: `4t³` then `1 − (−2t + 2)³ / 2`.
    EaseInOut,
    /// `t³`
    CubicIn,
    /// `1 − (1 − t)³`
    CubicOut,
}

impl Easing {
    /// Apply the curve to a progress value (clamped to `[0, 1]` first).
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
        }
    }
}

/// Axis/direction for slide and whip-pan transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideDirection {
    #[default]
    Left,
    Right,
    Up,
    Down,
}

/// Zoom variant: `In` pushes the outgoing frame toward the viewer,
/// `Out` pulls it away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomMode {
    #[default]
    In,
    Out,
}

/// Direction/variant options for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionOptions {
    pub direction: SlideDirection,
    pub zoom: ZoomMode,
    /// Seed for glitch jitter, so re-renders are identical.
    pub seed: u64,
    /// Whether glitch adds the channel-offset flash.
    pub flash: bool,
}

impl Default for TransitionOptions {
    fn default() -> Self {
        Self {
            direction: SlideDirection::Left,
            zoom: ZoomMode::In,
            seed: 0x5EED,
            flash: true,
        }
    }
}

/// A transition attached to the trailing edge of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    /// Length in seconds (always 0 for cuts).
    pub duration: f64,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default)]
    pub options: TransitionOptions,
}

impl Transition {
    /// A transition of the given kind with its fixed default duration.
    pub fn new(kind: TransitionKind) -> Self {
        Self {
            kind,
            duration: kind.default_duration(),
            easing: Easing::Linear,
            options: TransitionOptions::default(),
        }
    }

    /// A transition whose length is the kind's beat fraction at `bpm`.
    pub fn beat_synced(kind: TransitionKind, bpm: f64) -> Self {
        Self {
            duration: kind.duration_at_bpm(bpm),
            ..Self::new(kind)
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_options(mut self, options: TransitionOptions) -> Self {
        self.options = options;
        self
    }

    /// Effective duration: cuts are always instantaneous, others non-negative.
    pub fn effective_duration(&self) -> f64 {
        match self.kind {
            TransitionKind::Cut => 0.0,
            _ => self.duration.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_fractions_at_120_bpm() {
        assert_eq!(TransitionKind::Cut.duration_at_bpm(120.0), 0.0);
        assert!((TransitionKind::WhipPan.duration_at_bpm(120.0) - 0.125).abs() < 1e-12);
        assert!((TransitionKind::Glitch.duration_at_bpm(120.0) - 0.0625).abs() < 1e-12);
        assert!((TransitionKind::Zoom.duration_at_bpm(120.0) - 0.25).abs() < 1e-12);
        assert!((TransitionKind::Slide.duration_at_bpm(120.0) - 0.25).abs() < 1e-12);
        assert!((TransitionKind::Crossfade.duration_at_bpm(120.0) - 0.5).abs() < 1e-12);
        assert!((TransitionKind::FadeToBlack.duration_at_bpm(120.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_easing_endpoints() {
        let curves = [
            Easing::Linear,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::CubicIn,
            Easing::CubicOut,
        ];
        for easing in curves {
            assert!(easing.apply(0.0).abs() < 1e-12, "{easing:?} at 0");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-12, "{easing:?} at 1");
        }
        assert!((Easing::EaseInOut.apply(0.5) - 0.5).abs() < 1e-12);
        assert!((Easing::EaseIn.apply(0.5) - 0.25).abs() < 1e-12);
        assert!((Easing::EaseOut.apply(0.5) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_cut_has_no_duration() {
        let mut cut = Transition::new(TransitionKind::Cut);
        cut.duration = 3.0;
        assert_eq!(cut.effective_duration(), 0.0);
    }

    #[test]
    fn test_json_names_are_camel_case() {
        let t = Transition::new(TransitionKind::FadeToBlack);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"type\":\"fadeToBlack\""));
        assert_eq!(TransitionKind::from_name("whipPan"), Some(TransitionKind::WhipPan));
        assert_eq!(TransitionKind::from_name("wipe"), None);
    }
}
