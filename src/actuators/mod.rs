//! Uniform, best-effort interface to torch, vibrator, and flash overlay
//!
//! The host exposes these devices through [`DeviceActuator`]; the engine
//! talks to them only through [`ActuatorBridge`]. Every call is non-fatal
//! and non-blocking: a failure is logged, latches an "unavailable" flag for
//! the rest of the run, and audio continues unaffected.

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Appearance defaults persisted for the overlay surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayAppearance {
    pub brightness_percent: f64,
    pub tint_argb: i32,
}

impl Default for OverlayAppearance {
    fn default() -> Self {
        Self {
            brightness_percent: APPEARANCE_BRIGHTNESS_DEFAULT,
            tint_argb: 0xFFFF_FFFF_u32 as i32,
        }
    }
}

/// Per-session override applied on top of the appearance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlayOverride {
    pub brightness_percent: Option<f64>,
    pub tint_argb: Option<i32>,
}

/// Lower bound for persisted appearance brightness.
pub const APPEARANCE_BRIGHTNESS_FLOOR: f64 = 25.0;
/// Upper bound for persisted appearance brightness.
pub const APPEARANCE_BRIGHTNESS_CEIL: f64 = 100.0;
/// Appearance brightness used when the host sends garbage.
pub const APPEARANCE_BRIGHTNESS_DEFAULT: f64 = 80.0;

/// Clamp a per-pulse brightness request into [0, 100].
pub fn clamp_pulse_percent(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.round().clamp(0.0, 100.0)
}

/// Clamp a persisted appearance brightness into [25, 100].
pub fn clamp_appearance_percent(value: f64) -> f64 {
    if !value.is_finite() {
        return APPEARANCE_BRIGHTNESS_DEFAULT;
    }
    value
        .round()
        .clamp(APPEARANCE_BRIGHTNESS_FLOOR, APPEARANCE_BRIGHTNESS_CEIL)
}

/// Host-side device surface.
///
/// Implementations must not block: the worker calls these between tightly
/// scheduled symbol deadlines. Boolean returns report whether the host
/// confirmed the call.
pub trait DeviceActuator: Send + Sync {
    /// Drive the camera LED. Returns false when the torch is unavailable.
    fn set_torch_enabled(&self, on: bool) -> bool;

    /// Fire a haptic pulse of `duration_ms`. No-op for non-positive values.
    fn vibrate(&self, duration_ms: i64);

    /// Turn the fullscreen overlay on or off at a pulse brightness.
    fn set_flash_overlay_state(&self, on: bool, brightness_percent: f64) -> bool;

    /// Persist the default overlay appearance.
    fn set_flash_overlay_appearance(&self, brightness_percent: f64, tint_argb: i32) -> bool;

    /// Apply a per-session override on top of the appearance.
    fn set_flash_overlay_override(
        &self,
        brightness_percent: Option<f64>,
        tint_argb: Option<i32>,
    ) -> bool;

    /// Raise or drop the screen brightness boost.
    fn set_screen_brightness_boost(&self, on: bool);

    /// Block up to `timeout_ms` until the overlay surface exists.
    fn await_overlay_ready(&self, timeout_ms: i64) -> bool;

    /// Host diagnostics line describing overlay availability.
    fn overlay_availability_debug_string(&self) -> String;
}

/// Default actuator for hosts that wire no devices. Torch and haptics are
/// silently ignored; overlay calls report unavailable.
#[derive(Default)]
pub struct NullActuator;

impl DeviceActuator for NullActuator {
    fn set_torch_enabled(&self, _on: bool) -> bool {
        true
    }

    fn vibrate(&self, _duration_ms: i64) {}

    fn set_flash_overlay_state(&self, _on: bool, _brightness_percent: f64) -> bool {
        false
    }

    fn set_flash_overlay_appearance(&self, _brightness_percent: f64, _tint_argb: i32) -> bool {
        false
    }

    fn set_flash_overlay_override(
        &self,
        _brightness_percent: Option<f64>,
        _tint_argb: Option<i32>,
    ) -> bool {
        false
    }

    fn set_screen_brightness_boost(&self, _on: bool) {}

    fn await_overlay_ready(&self, _timeout_ms: i64) -> bool {
        false
    }

    fn overlay_availability_debug_string(&self) -> String {
        "overlay=none".to_string()
    }
}

/// Engine-side wrapper adding unavailability latches and persisted
/// appearance state on top of the raw device surface.
pub struct ActuatorBridge {
    device: Arc<dyn DeviceActuator>,
    torch_unavailable: AtomicBool,
    overlay_unavailable: AtomicBool,
    appearance: Mutex<OverlayAppearance>,
    session_override: Mutex<OverlayOverride>,
}

impl ActuatorBridge {
    pub fn new(device: Arc<dyn DeviceActuator>) -> Self {
        Self {
            device,
            torch_unavailable: AtomicBool::new(false),
            overlay_unavailable: AtomicBool::new(false),
            appearance: Mutex::new(OverlayAppearance::default()),
            session_override: Mutex::new(OverlayOverride::default()),
        }
    }

    /// Re-arm the unavailability latches at the start of a pattern run.
    pub fn begin_run(&self) {
        self.torch_unavailable.store(false, Ordering::Relaxed);
        self.overlay_unavailable.store(false, Ordering::Relaxed);
    }

    pub fn overlay_available(&self) -> bool {
        !self.overlay_unavailable.load(Ordering::Relaxed)
    }

    /// Torch pulse. Latches unavailable on the first failed enable.
    pub fn set_torch(&self, on: bool) -> bool {
        if self.torch_unavailable.load(Ordering::Relaxed) {
            return false;
        }
        let ok = self.device.set_torch_enabled(on);
        if !ok && on {
            warn!("[outputs] torch.unavailable");
            self.torch_unavailable.store(true, Ordering::Relaxed);
        }
        ok
    }

    /// Haptic pulse; non-positive durations are dropped.
    pub fn vibrate(&self, duration_ms: i64) {
        if duration_ms <= 0 {
            return;
        }
        self.device.vibrate(duration_ms);
    }

    /// Overlay pulse used by the pattern worker. Turning the overlay on and
    /// failing latches it off for the rest of the run; a failed turn-off is
    /// ignored (the surface is already gone).
    pub fn pulse_overlay(&self, on: bool, brightness_percent: f64) -> bool {
        if self.overlay_unavailable.load(Ordering::Relaxed) {
            return false;
        }
        let ok = self
            .device
            .set_flash_overlay_state(on, clamp_pulse_percent(brightness_percent));
        if !ok && on {
            self.overlay_unavailable.store(true, Ordering::Relaxed);
        }
        ok
    }

    /// Direct overlay state call from the facade (not latched).
    pub fn set_overlay_state(&self, on: bool, brightness_percent: f64) -> bool {
        self.device
            .set_flash_overlay_state(on, clamp_pulse_percent(brightness_percent))
    }

    /// Persist appearance and forward it to the host.
    pub fn set_overlay_appearance(&self, brightness_percent: f64, tint_argb: i32) -> bool {
        let clamped = clamp_appearance_percent(brightness_percent);
        if let Ok(mut appearance) = self.appearance.lock() {
            appearance.brightness_percent = clamped;
            appearance.tint_argb = tint_argb;
        }
        self.device.set_flash_overlay_appearance(clamped, tint_argb)
    }

    /// Persist a per-session override and forward it to the host.
    pub fn set_overlay_override(
        &self,
        brightness_percent: Option<f64>,
        tint_argb: Option<i32>,
    ) -> bool {
        let clamped = brightness_percent.map(clamp_appearance_percent);
        if let Ok(mut session) = self.session_override.lock() {
            session.brightness_percent = clamped;
            session.tint_argb = tint_argb;
        }
        self.device.set_flash_overlay_override(clamped, tint_argb)
    }

    /// Brightness the worker should pulse at: the session override when one
    /// is set, otherwise the request value.
    pub fn resolved_pulse_brightness(&self, requested_percent: f64) -> f64 {
        let overridden = self
            .session_override
            .lock()
            .ok()
            .and_then(|session| session.brightness_percent);
        clamp_pulse_percent(overridden.unwrap_or(requested_percent))
    }

    pub fn set_screen_brightness_boost(&self, on: bool) {
        debug!("[outputs] screenBrightnessBoost={}", on);
        self.device.set_screen_brightness_boost(on);
    }

    pub fn await_overlay_ready(&self, timeout_ms: i64) -> bool {
        self.device.await_overlay_ready(timeout_ms)
    }

    pub fn overlay_debug_string(&self) -> String {
        self.device.overlay_availability_debug_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingActuator;

    #[test]
    fn test_clamp_pulse_percent() {
        assert_eq!(clamp_pulse_percent(50.4), 50.0);
        assert_eq!(clamp_pulse_percent(-10.0), 0.0);
        assert_eq!(clamp_pulse_percent(180.0), 100.0);
        assert_eq!(clamp_pulse_percent(f64::NAN), 0.0);
    }

    #[test]
    fn test_clamp_appearance_percent() {
        assert_eq!(clamp_appearance_percent(10.0), 25.0);
        assert_eq!(clamp_appearance_percent(80.0), 80.0);
        assert_eq!(clamp_appearance_percent(120.0), 100.0);
        assert_eq!(clamp_appearance_percent(f64::NAN), 80.0);
    }

    #[test]
    fn test_overlay_failure_latches_for_run() {
        let device = Arc::new(RecordingActuator::new().fail_overlay_from_pulse(1));
        let bridge = ActuatorBridge::new(Arc::clone(&device) as Arc<dyn DeviceActuator>);
        bridge.begin_run();

        assert!(!bridge.pulse_overlay(true, 100.0));
        assert!(!bridge.overlay_available());
        // Latched: the device must not see another pulse this run.
        assert!(!bridge.pulse_overlay(true, 100.0));
        assert_eq!(device.overlay_on_calls(), 1);

        // A new run re-arms the latch.
        bridge.begin_run();
        assert!(bridge.overlay_available());
    }

    #[test]
    fn test_vibrate_drops_non_positive_durations() {
        let device = Arc::new(RecordingActuator::new());
        let bridge = ActuatorBridge::new(Arc::clone(&device) as Arc<dyn DeviceActuator>);
        bridge.vibrate(0);
        bridge.vibrate(-5);
        assert!(device.vibrations().is_empty());
        bridge.vibrate(120);
        assert_eq!(device.vibrations(), vec![120]);
    }

    #[test]
    fn test_override_brightness_wins_over_request() {
        let device = Arc::new(RecordingActuator::new());
        let bridge = ActuatorBridge::new(Arc::clone(&device) as Arc<dyn DeviceActuator>);

        assert_eq!(bridge.resolved_pulse_brightness(60.0), 60.0);
        bridge.set_overlay_override(Some(90.0), None);
        assert_eq!(bridge.resolved_pulse_brightness(60.0), 90.0);
        bridge.set_overlay_override(None, None);
        assert_eq!(bridge.resolved_pulse_brightness(60.0), 60.0);
    }

    #[test]
    fn test_appearance_is_clamped_and_persisted() {
        let device = Arc::new(RecordingActuator::new());
        let bridge = ActuatorBridge::new(Arc::clone(&device) as Arc<dyn DeviceActuator>);
        bridge.set_overlay_appearance(5.0, 0x00FF_0000);
        let appearance = bridge.appearance.lock().unwrap();
        assert_eq!(appearance.brightness_percent, 25.0);
        assert_eq!(appearance.tint_argb, 0x00FF_0000);
    }
}
