//! Test support: a recording device surface with scripted failures
//!
//! `RecordingActuator` logs every host call with a monotonic timestamp so
//! tests can assert ordering and payloads, and can be scripted to refuse
//! overlay pulses from a given count onward to exercise the unavailability
//! latch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::actuators::DeviceActuator;
use crate::time;

/// One recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCommand {
    Torch(bool),
    Vibrate(i64),
    OverlayState { on: bool, brightness_percent: f64 },
    OverlayAppearance { brightness_percent: f64, tint_argb: i32 },
    OverlayOverride {
        brightness_percent: Option<f64>,
        tint_argb: Option<i32>,
    },
    ScreenBrightnessBoost(bool),
}

/// Device surface that records calls instead of driving hardware.
pub struct RecordingActuator {
    commands: Mutex<Vec<(f64, ActuatorCommand)>>,
    overlay_on_calls: AtomicU64,
    /// Refuse overlay enables starting with this 1-based call count
    fail_overlay_from: Option<u64>,
    overlay_ready: bool,
    torch_supported: bool,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            overlay_on_calls: AtomicU64::new(0),
            fail_overlay_from: None,
            overlay_ready: true,
            torch_supported: true,
        }
    }

    /// Refuse overlay enable number `n` and every one after it.
    pub fn fail_overlay_from_pulse(mut self, n: u64) -> Self {
        self.fail_overlay_from = Some(n);
        self
    }

    pub fn without_overlay(mut self) -> Self {
        self.overlay_ready = false;
        self
    }

    pub fn without_torch(mut self) -> Self {
        self.torch_supported = false;
        self
    }

    fn record(&self, command: ActuatorCommand) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push((time::now_ms(), command));
        }
    }

    /// Snapshot of all recorded calls, in order.
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.commands
            .lock()
            .map(|commands| commands.iter().map(|(_, c)| c.clone()).collect())
            .unwrap_or_default()
    }

    /// Recorded calls with their timestamps.
    pub fn timed_commands(&self) -> Vec<(f64, ActuatorCommand)> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }

    pub fn vibrations(&self) -> Vec<i64> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                ActuatorCommand::Vibrate(ms) => Some(ms),
                _ => None,
            })
            .collect()
    }

    pub fn torch_pulses(&self) -> Vec<bool> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                ActuatorCommand::Torch(on) => Some(on),
                _ => None,
            })
            .collect()
    }

    pub fn overlay_pulses(&self) -> Vec<(bool, f64)> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                ActuatorCommand::OverlayState {
                    on,
                    brightness_percent,
                } => Some((on, brightness_percent)),
                _ => None,
            })
            .collect()
    }

    pub fn boost_calls(&self) -> Vec<bool> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                ActuatorCommand::ScreenBrightnessBoost(on) => Some(on),
                _ => None,
            })
            .collect()
    }

    /// How many times the engine tried to turn the overlay on.
    pub fn overlay_on_calls(&self) -> u64 {
        self.overlay_on_calls.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.clear();
        }
    }
}

impl Default for RecordingActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceActuator for RecordingActuator {
    fn set_torch_enabled(&self, on: bool) -> bool {
        if !self.torch_supported {
            return false;
        }
        self.record(ActuatorCommand::Torch(on));
        true
    }

    fn vibrate(&self, duration_ms: i64) {
        self.record(ActuatorCommand::Vibrate(duration_ms));
    }

    fn set_flash_overlay_state(&self, on: bool, brightness_percent: f64) -> bool {
        self.record(ActuatorCommand::OverlayState {
            on,
            brightness_percent,
        });
        if on {
            let count = self.overlay_on_calls.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(fail_from) = self.fail_overlay_from {
                if count >= fail_from {
                    return false;
                }
            }
        }
        self.overlay_ready
    }

    fn set_flash_overlay_appearance(&self, brightness_percent: f64, tint_argb: i32) -> bool {
        self.record(ActuatorCommand::OverlayAppearance {
            brightness_percent,
            tint_argb,
        });
        self.overlay_ready
    }

    fn set_flash_overlay_override(
        &self,
        brightness_percent: Option<f64>,
        tint_argb: Option<i32>,
    ) -> bool {
        self.record(ActuatorCommand::OverlayOverride {
            brightness_percent,
            tint_argb,
        });
        self.overlay_ready
    }

    fn set_screen_brightness_boost(&self, on: bool) {
        self.record(ActuatorCommand::ScreenBrightnessBoost(on));
    }

    fn await_overlay_ready(&self, _timeout_ms: i64) -> bool {
        self.overlay_ready
    }

    fn overlay_availability_debug_string(&self) -> String {
        format!("overlay=recording ready={}", self.overlay_ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let actuator = RecordingActuator::new();
        actuator.set_torch_enabled(true);
        actuator.vibrate(80);
        actuator.set_torch_enabled(false);
        assert_eq!(
            actuator.commands(),
            vec![
                ActuatorCommand::Torch(true),
                ActuatorCommand::Vibrate(80),
                ActuatorCommand::Torch(false),
            ]
        );
    }

    #[test]
    fn test_scripted_overlay_failure() {
        let actuator = RecordingActuator::new().fail_overlay_from_pulse(2);
        assert!(actuator.set_flash_overlay_state(true, 100.0));
        assert!(!actuator.set_flash_overlay_state(true, 100.0));
        assert!(!actuator.set_flash_overlay_state(true, 100.0));
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let actuator = RecordingActuator::new();
        actuator.vibrate(10);
        actuator.vibrate(20);
        let timed = actuator.timed_commands();
        assert!(timed[0].0 <= timed[1].0);
    }
}
