//! Configuration for tone defaults, scheduler pacing, and telemetry limits
//!
//! Values can be loaded from a JSON file for tuning without recompilation;
//! anything missing or malformed falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tone: ToneConfig,
    pub scheduler: SchedulerConfig,
    pub telemetry: TelemetryConfig,
}

/// Tone synthesis defaults and input clamps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Gain applied when a request leaves it unset or non-finite
    pub default_gain: f32,
    /// Envelope attack when a request leaves it unset, in ms
    pub default_attack_ms: f32,
    /// Envelope release when a request leaves it unset, in ms
    pub default_release_ms: f32,
    /// Frequency used when a request carries a non-positive tone, in Hz
    pub default_tone_hz: f64,
    /// Lower clamp for requested tone frequency, in Hz
    pub min_tone_hz: f64,
    /// Upper clamp for requested tone frequency, in Hz
    pub max_tone_hz: f64,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            default_gain: 1.0,
            // A few ms of ramp suppresses start/stop clicks without
            // audibly softening symbol edges, even for short dots.
            default_attack_ms: 2.5,
            default_release_ms: 6.0,
            default_tone_hz: 600.0,
            min_tone_hz: 80.0,
            max_tone_hz: 2000.0,
        }
    }
}

impl ToneConfig {
    /// Clamp a requested frequency into the playable band.
    ///
    /// Non-finite or non-positive values fall back to the default tone.
    pub fn clamp_tone_hz(&self, requested: f64) -> f64 {
        if !requested.is_finite() || requested <= 0.0 {
            return self.default_tone_hz;
        }
        requested.clamp(self.min_tone_hz, self.max_tone_hz)
    }

    /// Resolve an optional gain into [0, 1].
    pub fn resolve_gain(&self, requested: Option<f64>) -> f32 {
        match requested {
            Some(value) if value.is_finite() => (value as f32).clamp(0.0, 1.0),
            _ => self.default_gain,
        }
    }
}

/// Pattern worker pacing constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How far before a symbol's audio start the worker may wake, in ms.
    /// Compensates actuator latency and typical OS wake jitter.
    pub dispatch_lead_ms: f64,
    /// Minimum silence that must remain between dispatches before any lead
    /// is taken from the gap, in ms
    pub min_dispatch_offset_ms: f64,
    /// Cancellable sleep slice, in ms. Cancellation latency is bounded by
    /// this value.
    pub sleep_quantum_ms: f64,
    /// How long `play_morse` waits for the overlay surface when flash is
    /// enabled, in ms
    pub overlay_ready_timeout_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispatch_lead_ms: 4.0,
            min_dispatch_offset_ms: 12.0,
            sleep_quantum_ms: 1.0,
            overlay_ready_timeout_ms: 180,
        }
    }
}

/// Telemetry buffer limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Snapshot FIFO capacity; oldest entries drop silently on overflow
    pub snapshot_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            snapshot_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Parsed configuration, or defaults if the file is missing or invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[config] loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[config] failed to parse {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[config] failed to read {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.tone.default_gain, 1.0);
        assert_eq!(config.tone.default_attack_ms, 2.5);
        assert_eq!(config.tone.default_release_ms, 6.0);
        assert_eq!(config.scheduler.dispatch_lead_ms, 4.0);
        assert_eq!(config.scheduler.min_dispatch_offset_ms, 12.0);
        assert_eq!(config.telemetry.snapshot_capacity, 64);
    }

    #[test]
    fn test_clamp_tone_hz() {
        let tone = ToneConfig::default();
        assert_eq!(tone.clamp_tone_hz(600.0), 600.0);
        assert_eq!(tone.clamp_tone_hz(10.0), 80.0);
        assert_eq!(tone.clamp_tone_hz(9000.0), 2000.0);
        assert_eq!(tone.clamp_tone_hz(f64::NAN), 600.0);
        assert_eq!(tone.clamp_tone_hz(-1.0), 600.0);
    }

    #[test]
    fn test_resolve_gain_clamps_and_defaults() {
        let tone = ToneConfig::default();
        assert_eq!(tone.resolve_gain(Some(0.5)), 0.5);
        assert_eq!(tone.resolve_gain(Some(2.0)), 1.0);
        assert_eq!(tone.resolve_gain(Some(-0.5)), 0.0);
        assert_eq!(tone.resolve_gain(Some(f64::INFINITY)), 1.0);
        assert_eq!(tone.resolve_gain(None), 1.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.scheduler.dispatch_lead_ms, config.scheduler.dispatch_lead_ms);
        assert_eq!(parsed.telemetry.snapshot_capacity, config.telemetry.snapshot_capacity);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let parsed: EngineConfig =
            serde_json::from_str(r#"{"scheduler":{"dispatch_lead_ms":6.0}}"#).unwrap();
        assert_eq!(parsed.scheduler.dispatch_lead_ms, 6.0);
        assert_eq!(parsed.scheduler.min_dispatch_offset_ms, 12.0);
        assert_eq!(parsed.tone.default_gain, 1.0);
    }
}
