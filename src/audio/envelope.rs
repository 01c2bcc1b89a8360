//! Amplitude envelope: per-sample linear ramps between gain levels
//!
//! The ramp steps are precomputed outside the callback (see
//! [`crate::audio::tone::ToneShared::raise`]); the callback only applies
//! [`advance_gain`] per frame. A zero-duration ramp degenerates to a step
//! the size of the full magnitude, so the transition completes in one frame.

use serde::{Deserialize, Serialize};

/// Attack and release times in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    pub attack_ms: f32,
    pub release_ms: f32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack_ms: 2.5,
            release_ms: 6.0,
        }
    }
}

/// Optional envelope overrides carried by a tone or playback request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneEnvelopeOptions {
    pub attack_ms: Option<f64>,
    pub release_ms: Option<f64>,
}

impl EnvelopeConfig {
    /// Resolve request overrides on top of configured defaults.
    ///
    /// Negative or non-finite values are treated as 0 (immediate
    /// transition).
    pub fn resolve(options: Option<&ToneEnvelopeOptions>, defaults: EnvelopeConfig) -> Self {
        let mut config = defaults;
        if let Some(options) = options {
            if let Some(attack) = options.attack_ms {
                if attack.is_finite() {
                    config.attack_ms = (attack as f32).max(0.0);
                } else {
                    config.attack_ms = 0.0;
                }
            }
            if let Some(release) = options.release_ms {
                if release.is_finite() {
                    config.release_ms = (release as f32).max(0.0);
                } else {
                    config.release_ms = 0.0;
                }
            }
        }
        config
    }
}

/// Per-frame gain step that crosses `magnitude` in `duration_ms`.
///
/// `frames(d) = max(1, sample_rate * d / 1000)`; a non-positive duration or
/// sample rate yields the full magnitude (single-frame transition).
#[inline]
pub fn ramp_step(magnitude: f32, duration_ms: f32, sample_rate: f64) -> f32 {
    if duration_ms <= 0.0 || sample_rate <= 0.0 {
        return magnitude;
    }
    let frames = (sample_rate * duration_ms as f64 / 1000.0).max(1.0);
    magnitude / frames as f32
}

/// Move `current` one step toward `target`, clamping at the target.
#[inline]
pub fn advance_gain(current: f32, target: f32, step_up: f32, step_down: f32) -> f32 {
    if current < target {
        (current + step_up).min(target)
    } else if current > target {
        (current - step_down).max(target)
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_step_spreads_over_frames() {
        // 48 kHz, 2.5 ms: 120 frames.
        let step = ramp_step(1.0, 2.5, 48_000.0);
        assert!((step - 1.0 / 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_ramp_step_zero_duration_is_immediate() {
        assert_eq!(ramp_step(0.8, 0.0, 48_000.0), 0.8);
        assert_eq!(ramp_step(0.8, -3.0, 48_000.0), 0.8);
    }

    #[test]
    fn test_ramp_step_short_duration_clamps_to_one_frame() {
        // Duration shorter than one frame still produces a finite step.
        let step = ramp_step(1.0, 0.001, 48_000.0);
        assert_eq!(step, 1.0);
    }

    #[test]
    fn test_advance_gain_ramps_up_and_clamps() {
        let mut gain = 0.0;
        for _ in 0..10 {
            gain = advance_gain(gain, 1.0, 0.3, 0.1);
        }
        assert_eq!(gain, 1.0, "gain should saturate at target");
    }

    #[test]
    fn test_advance_gain_ramps_down_and_clamps() {
        let mut gain = 1.0;
        gain = advance_gain(gain, 0.0, 0.3, 0.4);
        assert!((gain - 0.6).abs() < 1e-6);
        gain = advance_gain(gain, 0.0, 0.3, 0.4);
        assert!((gain - 0.2).abs() < 1e-6);
        gain = advance_gain(gain, 0.0, 0.3, 0.4);
        assert_eq!(gain, 0.0, "gain should not undershoot target");
    }

    #[test]
    fn test_advance_gain_holds_at_target() {
        assert_eq!(advance_gain(0.5, 0.5, 0.1, 0.1), 0.5);
    }

    #[test]
    fn test_resolve_defaults_when_unset() {
        let config = EnvelopeConfig::resolve(None, EnvelopeConfig::default());
        assert_eq!(config.attack_ms, 2.5);
        assert_eq!(config.release_ms, 6.0);
    }

    #[test]
    fn test_resolve_sanitizes_bad_values() {
        let options = ToneEnvelopeOptions {
            attack_ms: Some(-4.0),
            release_ms: Some(f64::NAN),
        };
        let config = EnvelopeConfig::resolve(Some(&options), EnvelopeConfig::default());
        assert_eq!(config.attack_ms, 0.0);
        assert_eq!(config.release_ms, 0.0);
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let options = ToneEnvelopeOptions {
            attack_ms: Some(1.0),
            release_ms: Some(12.0),
        };
        let config = EnvelopeConfig::resolve(Some(&options), EnvelopeConfig::default());
        assert_eq!(config.attack_ms, 1.0);
        assert_eq!(config.release_ms, 12.0);
    }
}
