//! Playback worker: paces one pattern against the monotonic clock
//!
//! One worker thread exists at most at any time. It is not real-time: it
//! sleeps in cancellable 1 ms quanta, raises and releases the tone through
//! the shared atomics, pulses the actuators with a small dispatch lead, and
//! reports per-symbol telemetry. Cancellation is cooperative; the flag is
//! checked at every quantum and between phases.

use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::actuators::ActuatorBridge;
use crate::audio::envelope::EnvelopeConfig;
use crate::audio::tone::ToneShared;
use crate::config::SchedulerConfig;
use crate::morse::{Pattern, LETTER_GAP_UNITS};
use crate::telemetry::{
    CallbackSlot, DispatchEvent, DispatchPhase, ScheduledSymbol, Snapshot, TelemetryStore,
};
use crate::time;

use super::compute_lead_ms;

/// Fully resolved playback parameters (defaults applied, inputs clamped).
#[derive(Debug, Clone)]
pub struct PlaybackParams {
    pub pattern: Pattern,
    pub tone_hz: f64,
    pub gain: f32,
    pub unit_ms: f64,
    pub flash_enabled: bool,
    pub haptics_enabled: bool,
    pub torch_enabled: bool,
    pub flash_brightness_percent: f64,
}

/// Everything one worker needs, bundled at spawn time.
pub struct WorkerContext {
    pub shared: Arc<ToneShared>,
    pub bridge: Arc<ActuatorBridge>,
    pub telemetry: Arc<TelemetryStore>,
    pub observer: Arc<CallbackSlot>,
    pub cancel: Arc<AtomicBool>,
    pub running: Arc<AtomicBool>,
    pub scheduler: SchedulerConfig,
    pub envelope: EnvelopeConfig,
    pub params: PlaybackParams,
    pub schedule: Vec<ScheduledSymbol>,
    pub pattern_start: Instant,
    pub pattern_start_ms: f64,
    /// Whether the overlay surface answered the readiness wait
    pub overlay_available: bool,
    /// Whether the facade raised the screen brightness boost for this run
    pub boost_engaged: bool,
}

/// Sleep until `deadline` in cancellable quanta.
///
/// Returns false as soon as the cancel flag is observed; cancellation
/// latency is bounded by the quantum.
fn sleep_until(deadline: Instant, cancel: &AtomicBool, quantum: Duration) -> bool {
    loop {
        if cancel.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(quantum));
    }
}

fn offset_deadline(start: Instant, offset_ms: f64) -> Instant {
    start + Duration::from_secs_f64(offset_ms.max(0.0) / 1000.0)
}

fn base_event(
    phase: DispatchPhase,
    entry: &ScheduledSymbol,
    ctx: &WorkerContext,
    lead_ms: f64,
    expected_since_prior_ms: Option<f64>,
) -> DispatchEvent {
    DispatchEvent {
        phase,
        symbol: entry.symbol.glyph(),
        sequence: entry.sequence,
        pattern_start_ms: ctx.pattern_start_ms,
        expected_timestamp_ms: entry.expected_timestamp_ms,
        offset_ms: entry.offset_ms,
        duration_ms: entry.duration_ms,
        unit_ms: ctx.params.unit_ms,
        tone_hz: ctx.params.tone_hz,
        scheduled_timestamp_ms: time::now_ms(),
        lead_ms,
        actual_timestamp_ms: None,
        monotonic_timestamp_ms: None,
        start_skew_ms: None,
        batch_elapsed_ms: None,
        expected_since_prior_ms,
        since_prior_ms: None,
        native_flash_available: None,
        flash_handled_natively: None,
    }
}

/// Drive one pattern to completion or cancellation.
pub fn run_pattern(ctx: WorkerContext) {
    info!(
        "[outputs-audio] playMorse.start count={} unit={:.1}",
        ctx.params.pattern.len(),
        ctx.params.unit_ms
    );

    let quantum = Duration::from_secs_f64(ctx.scheduler.sleep_quantum_ms.max(0.1) / 1000.0);
    let unit_ms = ctx.params.unit_ms;

    let mut cancelled = false;
    let mut overlay_ok = ctx.overlay_available;
    let mut boost_active = ctx.boost_engaged;
    let mut torch_on = false;
    let mut overlay_on = false;

    // Expected end offset of the previous tone, for gap-lead budgeting.
    let mut prev_end_offset_ms = 0.0;
    let mut prior_audio_start_ms: Option<f64> = None;
    let mut prior_expected_ms: Option<f64> = None;

    let mut entries = ctx.schedule.iter();

    for symbol in ctx.params.pattern.iter() {
        if ctx.cancel.load(Ordering::Acquire) {
            cancelled = true;
            break;
        }

        if !symbol.is_tone() {
            // Relative sleep; the next tone's absolute wake absorbs any
            // drift this introduces.
            let deadline = Instant::now() + Duration::from_secs_f64(LETTER_GAP_UNITS * unit_ms / 1000.0);
            if !sleep_until(deadline, &ctx.cancel, quantum) {
                cancelled = true;
                break;
            }
            continue;
        }

        let Some(entry) = entries.next() else {
            break;
        };

        let expected_start_offset = entry.offset_ms;
        let available_gap_lead = (expected_start_offset - prev_end_offset_ms).max(0.0);
        let lead_ms = compute_lead_ms(
            ctx.scheduler.dispatch_lead_ms,
            ctx.scheduler.min_dispatch_offset_ms,
            expected_start_offset,
            available_gap_lead,
        );

        let wake = offset_deadline(ctx.pattern_start, expected_start_offset - lead_ms);
        if !sleep_until(wake, &ctx.cancel, quantum) {
            cancelled = true;
            break;
        }

        let expected_since_prior =
            prior_expected_ms.map(|prior| entry.expected_timestamp_ms - prior);
        ctx.observer.emit(&base_event(
            DispatchPhase::Scheduled,
            entry,
            &ctx,
            lead_ms,
            expected_since_prior,
        ));

        // Raise the tone; the audible edge lands once the lead elapses.
        ctx.shared
            .raise(ctx.params.tone_hz, ctx.params.gain, &ctx.envelope);
        ctx.shared.set_tone_active(true);

        let (started_at, started_at_ms) = time::now_pair();
        let audio_start_ms = started_at_ms + lead_ms;
        let start_skew_ms = audio_start_ms - entry.expected_timestamp_ms;
        let batch_elapsed_ms = audio_start_ms - ctx.pattern_start_ms;
        let since_prior = prior_audio_start_ms.map(|prior| audio_start_ms - prior);

        ctx.telemetry.push_snapshot(Snapshot {
            sequence: entry.sequence,
            symbol: entry.symbol,
            timestamp_ms: audio_start_ms,
            duration_ms: entry.duration_ms,
            pattern_start_ms: ctx.pattern_start_ms,
            expected_timestamp_ms: entry.expected_timestamp_ms,
            start_skew_ms,
            batch_elapsed_ms,
            expected_since_prior_ms: expected_since_prior.unwrap_or(0.0),
            since_prior_ms: since_prior.unwrap_or(0.0),
        });

        let mut flash_handled_natively = false;
        if ctx.params.flash_enabled && overlay_ok {
            let brightness = ctx
                .bridge
                .resolved_pulse_brightness(ctx.params.flash_brightness_percent);
            if ctx.bridge.pulse_overlay(true, brightness) {
                overlay_on = true;
                flash_handled_natively = true;
            } else {
                overlay_ok = false;
                warn!(
                    "[outputs] overlay.symbol.unavailable sequence={}",
                    entry.sequence
                );
                if boost_active {
                    ctx.bridge.set_screen_brightness_boost(false);
                    boost_active = false;
                }
            }
        }
        if ctx.params.torch_enabled && ctx.bridge.set_torch(true) {
            torch_on = true;
        }
        if ctx.params.haptics_enabled {
            ctx.bridge.vibrate(entry.duration_ms.round() as i64);
        }

        let mut actual = base_event(
            DispatchPhase::Actual,
            entry,
            &ctx,
            lead_ms,
            expected_since_prior,
        );
        actual.actual_timestamp_ms = Some(audio_start_ms);
        actual.monotonic_timestamp_ms = Some(started_at_ms);
        actual.start_skew_ms = Some(start_skew_ms);
        actual.batch_elapsed_ms = Some(batch_elapsed_ms);
        actual.since_prior_ms = since_prior;
        actual.native_flash_available = Some(overlay_ok);
        actual.flash_handled_natively = Some(flash_handled_natively);
        ctx.observer.emit(&actual);

        let hold_end = started_at + Duration::from_secs_f64((lead_ms + entry.duration_ms) / 1000.0);
        if !sleep_until(hold_end, &ctx.cancel, quantum) {
            cancelled = true;
        }

        if torch_on {
            ctx.bridge.set_torch(false);
            torch_on = false;
        }
        if overlay_on {
            ctx.bridge.pulse_overlay(false, 0.0);
            overlay_on = false;
        }
        ctx.shared.release(&ctx.envelope);
        ctx.shared.set_tone_active(false);

        if cancelled {
            break;
        }

        prior_audio_start_ms = Some(audio_start_ms);
        prior_expected_ms = Some(entry.expected_timestamp_ms);
        prev_end_offset_ms = expected_start_offset + entry.duration_ms;
    }

    // End of pattern, natural or cancelled: silence and release anything
    // this worker raised.
    ctx.shared.release(&ctx.envelope);
    ctx.shared.set_tone_active(false);
    if torch_on {
        ctx.bridge.set_torch(false);
    }
    if overlay_on {
        ctx.bridge.pulse_overlay(false, 0.0);
    }
    if boost_active {
        ctx.bridge.set_screen_brightness_boost(false);
    }

    let was_cancelled = cancelled || ctx.cancel.load(Ordering::Acquire);
    if was_cancelled {
        ctx.telemetry.clear();
    }
    ctx.running.store(false, Ordering::Release);
    ctx.cancel.store(false, Ordering::Release);
    info!(
        "[outputs-audio] playMorse.end cancelled={}",
        if was_cancelled { 1 } else { 0 }
    );
}

struct ActiveWorker {
    handle: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

/// Owns the single pattern worker and its start/cancel sequencing.
///
/// Starting a new pattern cancels and joins the previous worker first, so
/// dispatch events never interleave across patterns. Cancelling from the
/// worker's own thread detaches instead of self-joining.
#[derive(Default)]
pub struct PlaybackController {
    active: Mutex<Option<ActiveWorker>>,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .map(|guard| {
                guard
                    .as_ref()
                    .map(|worker| worker.running.load(Ordering::Acquire))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Signal cancellation and, unless invoked from the worker itself,
    /// wait for it to exit.
    pub fn cancel_worker(&self, join: bool) {
        let taken = match self.active.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(worker) = taken {
            worker.cancel.store(true, Ordering::Release);
            if join && worker.handle.thread().id() != thread::current().id() {
                let _ = worker.handle.join();
            }
            // Detached workers clear their own flags on exit.
        }
    }

    /// Spawn a worker for `ctx`. The caller must have cancelled any
    /// predecessor first.
    pub fn spawn_pattern(&self, ctx: WorkerContext) {
        let cancel = Arc::clone(&ctx.cancel);
        let running = Arc::clone(&ctx.running);
        running.store(true, Ordering::Release);
        cancel.store(false, Ordering::Release);
        let handle = thread::spawn(move || run_pattern(ctx));
        if let Ok(mut guard) = self.active.lock() {
            *guard = Some(ActiveWorker {
                handle,
                cancel,
                running,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_until_reaches_deadline() {
        let cancel = AtomicBool::new(false);
        let deadline = Instant::now() + Duration::from_millis(5);
        let completed = sleep_until(deadline, &cancel, Duration::from_millis(1));
        assert!(completed);
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn test_sleep_until_observes_cancel_quickly() {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_clone = Arc::clone(&cancel);
        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            cancel_clone.store(true, Ordering::Release);
        });

        let start = Instant::now();
        let deadline = start + Duration::from_secs(5);
        let completed = sleep_until(deadline, &cancel, Duration::from_millis(1));
        let elapsed = start.elapsed();
        setter.join().unwrap();

        assert!(!completed, "cancel must interrupt the sleep");
        assert!(
            elapsed < Duration::from_millis(100),
            "cancellation took {:?}",
            elapsed
        );
    }

    #[test]
    fn test_sleep_until_past_deadline_returns_immediately() {
        let cancel = AtomicBool::new(false);
        let completed = sleep_until(
            Instant::now() - Duration::from_millis(1),
            &cancel,
            Duration::from_millis(1),
        );
        assert!(completed);
    }

    #[test]
    fn test_controller_cancel_without_worker_is_noop() {
        let controller = PlaybackController::new();
        controller.cancel_worker(true);
        assert!(!controller.is_running());
    }
}
