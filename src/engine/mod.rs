//! OutputsEngine: the facade orchestrating audio, actuators, scheduling,
//! and telemetry
//!
//! Lifecycle: the output stream opens lazily on the first tone or warmup,
//! stays open across pulses, and is released on teardown or after an
//! irrecoverable stream error (the next call reopens it). The pattern
//! worker is transient; starting a new pattern cancels and joins the
//! previous one before spawning.
//!
//! Every public call returns promptly. Failures never propagate to the
//! caller; they are logged and visible as missing progress in telemetry.

use log::{debug, info};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use crate::actuators::{ActuatorBridge, DeviceActuator, NullActuator};
use crate::audio::backend::{platform_backend, AudioBackend};
use crate::audio::envelope::{EnvelopeConfig, ToneEnvelopeOptions};
use crate::audio::tone::ToneShared;
use crate::config::EngineConfig;
use crate::morse::Pattern;
use crate::scheduler::build_schedule;
use crate::scheduler::worker::{PlaybackController, PlaybackParams, WorkerContext};
use crate::telemetry::{CallbackSlot, ScheduledSymbol, SymbolDispatchCallback, TelemetryStore};
use crate::time;

/// Options for a sustained tone (keyer press).
#[derive(Debug, Clone, Copy, Default)]
pub struct ToneStartOptions {
    pub tone_hz: f64,
    pub gain: Option<f64>,
    pub envelope: Option<ToneEnvelopeOptions>,
}

/// High-level playback request for one pattern.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub pattern: Pattern,
    pub tone_hz: f64,
    pub unit_ms: f64,
    pub gain: Option<f64>,
    pub envelope: Option<ToneEnvelopeOptions>,
    pub flash_enabled: bool,
    pub haptics_enabled: bool,
    pub torch_enabled: bool,
    pub flash_brightness_percent: f64,
    pub screen_brightness_boost: bool,
}

impl Default for PlaybackRequest {
    fn default() -> Self {
        Self {
            pattern: Vec::new(),
            tone_hz: 600.0,
            unit_ms: 80.0,
            gain: None,
            envelope: None,
            flash_enabled: false,
            haptics_enabled: false,
            torch_enabled: false,
            flash_brightness_percent: 100.0,
            screen_brightness_boost: false,
        }
    }
}

/// Facade owning the whole output path.
pub struct OutputsEngine {
    config: EngineConfig,
    shared: Arc<ToneShared>,
    backend: Arc<dyn AudioBackend>,
    bridge: Arc<ActuatorBridge>,
    telemetry: Arc<TelemetryStore>,
    observer: Arc<CallbackSlot>,
    playback: PlaybackController,
    envelope: Mutex<EnvelopeConfig>,
}

impl OutputsEngine {
    /// Engine with the platform backend and no wired actuators.
    pub fn new() -> Self {
        let shared = Arc::new(ToneShared::new());
        let backend = platform_backend(Arc::clone(&shared));
        Self::with_parts(shared, backend, Arc::new(NullActuator), EngineConfig::default())
    }

    /// Engine with an injected backend and device surface. This is the
    /// seam tests and alternative hosts use.
    pub fn with_parts(
        shared: Arc<ToneShared>,
        backend: Arc<dyn AudioBackend>,
        device: Arc<dyn DeviceActuator>,
        config: EngineConfig,
    ) -> Self {
        let telemetry = Arc::new(TelemetryStore::new(config.telemetry.snapshot_capacity));
        let envelope = EnvelopeConfig {
            attack_ms: config.tone.default_attack_ms,
            release_ms: config.tone.default_release_ms,
        };
        Self {
            config,
            shared,
            backend,
            bridge: Arc::new(ActuatorBridge::new(device)),
            telemetry,
            observer: Arc::new(CallbackSlot::new()),
            playback: PlaybackController::new(),
            envelope: Mutex::new(envelope),
        }
    }

    /// Whether a low-latency output stream can be opened. Memoized.
    pub fn is_supported(&self) -> bool {
        self.backend.probe_support()
    }

    /// Whether a pattern worker is currently running.
    pub fn is_playing(&self) -> bool {
        self.playback.is_running()
    }

    /// Open and start the stream ahead of time so the first symbol lands
    /// with minimal latency. Leaves the output silent.
    pub fn warmup(&self, tone_hz: f64) {
        if !self.is_supported() {
            return;
        }
        let tone_hz = self.config.tone.clamp_tone_hz(tone_hz);
        self.backend.ensure_open(tone_hz);
        if !self.backend.is_ready() {
            return;
        }
        self.shared.reset_levels(tone_hz);
        debug!("[outputs-audio] warmup hz={:.1}", tone_hz);
    }

    /// Raise a sustained tone, cancelling any running pattern first.
    pub fn start_tone(&self, options: ToneStartOptions) {
        if !self.is_supported() {
            return;
        }
        self.playback.cancel_worker(true);

        let tone_hz = self.config.tone.clamp_tone_hz(options.tone_hz);
        self.backend.ensure_open(tone_hz);
        if !self.backend.is_ready() {
            return;
        }

        let gain = self.config.tone.resolve_gain(options.gain);
        let envelope = EnvelopeConfig::resolve(
            options.envelope.as_ref(),
            EnvelopeConfig {
                attack_ms: self.config.tone.default_attack_ms,
                release_ms: self.config.tone.default_release_ms,
            },
        );
        if let Ok(mut current) = self.envelope.lock() {
            *current = envelope;
        }

        self.shared.raise(tone_hz, gain, &envelope);
        debug!(
            "[outputs-audio] start hz={:.1} gain={:.3} attack={:.2} release={:.2}",
            tone_hz, gain, envelope.attack_ms, envelope.release_ms
        );
    }

    /// Ramp the tone to silence at the configured release time. The stream
    /// stays open. Idempotent.
    pub fn stop_tone(&self) {
        if !self.is_supported() || !self.backend.is_ready() {
            return;
        }
        let envelope = self
            .envelope
            .lock()
            .map(|guard| *guard)
            .unwrap_or_default();
        self.shared.release(&envelope);
        debug!(
            "[outputs-audio] stop gain={:.3} release={:.2}",
            self.shared.current_gain(),
            envelope.release_ms
        );
    }

    /// Plan and start a pattern. Returns immediately; progress is visible
    /// through dispatch events and telemetry.
    pub fn play_morse(&self, request: PlaybackRequest) {
        if !self.is_supported() {
            info!("[outputs-audio] playMorse.skip unsupported=1");
            return;
        }
        if request.pattern.is_empty() {
            return;
        }
        if !request.unit_ms.is_finite() || request.unit_ms <= 0.0 {
            info!("[outputs-audio] playMorse.skip unit={}", request.unit_ms);
            return;
        }

        let tone_hz = self.config.tone.clamp_tone_hz(request.tone_hz);
        self.backend.ensure_open(tone_hz);
        if !self.backend.is_ready() {
            info!("[outputs-audio] playMorse.skip stream=closed");
            return;
        }

        // Exactly one worker at a time: join the predecessor first.
        self.playback.cancel_worker(true);

        let gain = self.config.tone.resolve_gain(request.gain);
        let envelope = EnvelopeConfig::resolve(
            request.envelope.as_ref(),
            EnvelopeConfig {
                attack_ms: self.config.tone.default_attack_ms,
                release_ms: self.config.tone.default_release_ms,
            },
        );
        if let Ok(mut current) = self.envelope.lock() {
            *current = envelope;
        }

        self.bridge.begin_run();
        let overlay_available = if request.flash_enabled {
            self.bridge
                .await_overlay_ready(self.config.scheduler.overlay_ready_timeout_ms)
        } else {
            false
        };
        let boost_engaged =
            request.flash_enabled && request.screen_brightness_boost && overlay_available;
        if boost_engaged {
            self.bridge.set_screen_brightness_boost(true);
        }

        let (pattern_start, pattern_start_ms) = time::now_pair();
        let schedule = build_schedule(&request.pattern, request.unit_ms, pattern_start_ms);
        self.telemetry
            .install_schedule(schedule.clone(), pattern_start_ms);

        let params = PlaybackParams {
            pattern: request.pattern,
            tone_hz,
            gain,
            unit_ms: request.unit_ms,
            flash_enabled: request.flash_enabled,
            haptics_enabled: request.haptics_enabled,
            torch_enabled: request.torch_enabled,
            flash_brightness_percent: request.flash_brightness_percent,
        };

        let ctx = WorkerContext {
            shared: Arc::clone(&self.shared),
            bridge: Arc::clone(&self.bridge),
            telemetry: Arc::clone(&self.telemetry),
            observer: Arc::clone(&self.observer),
            cancel: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(true)),
            scheduler: self.config.scheduler.clone(),
            envelope,
            params,
            schedule,
            pattern_start,
            pattern_start_ms,
            overlay_available,
            boost_engaged,
        };
        self.playback.spawn_pattern(ctx);
    }

    /// Cancel any running pattern and silence the tone. The worker clears
    /// telemetry on its way out.
    pub fn stop_morse(&self) {
        self.playback.cancel_worker(true);
        self.stop_tone();
    }

    /// Install or clear the dispatch observer. The callback runs on the
    /// worker thread and must not re-enter the engine.
    pub fn set_symbol_dispatch_callback(&self, callback: Option<SymbolDispatchCallback>) {
        self.observer.install(callback);
    }

    /// Direct overlay control, forwarded to the host.
    pub fn set_flash_overlay_state(&self, on: bool, brightness_percent: f64) -> bool {
        self.bridge.set_overlay_state(on, brightness_percent)
    }

    /// Persist the default overlay appearance.
    pub fn set_flash_overlay_appearance(&self, brightness_percent: f64, tint_argb: i32) -> bool {
        self.bridge.set_overlay_appearance(brightness_percent, tint_argb)
    }

    /// Apply a per-session overlay override.
    pub fn set_flash_overlay_override(
        &self,
        brightness_percent: Option<f64>,
        tint_argb: Option<i32>,
    ) -> bool {
        self.bridge.set_overlay_override(brightness_percent, tint_argb)
    }

    /// Host diagnostics line for the overlay surface.
    pub fn overlay_debug_string(&self) -> String {
        self.bridge.overlay_debug_string()
    }

    /// Typed view of the current schedule.
    pub fn scheduled_symbols(&self) -> Vec<ScheduledSymbol> {
        self.telemetry.scheduled_symbols()
    }

    /// JSON array of the current schedule.
    pub fn scheduled_symbols_json(&self) -> String {
        self.telemetry.schedule_json()
    }

    /// Pop and serialize the oldest captured snapshot, or `None`.
    pub fn latest_symbol_info(&self) -> Option<String> {
        self.telemetry.latest_symbol_info()
    }

    /// Cancel the worker, clear the observer, close the stream. Idempotent:
    /// every step tolerates repeats.
    pub fn teardown(&self) {
        self.playback.cancel_worker(true);
        self.observer.install(None);
        self.backend.close();
        info!("[outputs-audio] teardown");
    }
}

impl Default for OutputsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OutputsEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
