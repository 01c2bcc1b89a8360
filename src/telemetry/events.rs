//! Dispatch events delivered synchronously to the host observer
//!
//! Two events bracket every tone: `scheduled` fires right before the
//! envelope is raised, `actual` right after the actuators were pulsed.
//! Events arrive strictly ordered by sequence from a single worker thread.
//! Observers must not re-enter the engine from the callback.

use log::warn;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Which side of a dispatch the event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPhase {
    Scheduled,
    Actual,
}

/// Per-symbol dispatch report.
///
/// Optional fields are present only on the `actual` phase, except
/// `expected_since_prior_ms` which is also set on `scheduled` from the
/// second symbol on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEvent {
    pub phase: DispatchPhase,
    pub symbol: char,
    pub sequence: u64,
    pub pattern_start_ms: f64,
    pub expected_timestamp_ms: f64,
    pub offset_ms: f64,
    pub duration_ms: f64,
    pub unit_ms: f64,
    pub tone_hz: f64,
    /// When this event was emitted, on the monotonic clock
    pub scheduled_timestamp_ms: f64,
    pub lead_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_timestamp_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monotonic_timestamp_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_skew_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_elapsed_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_since_prior_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_prior_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_flash_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash_handled_natively: Option<bool>,
}

/// Observer signature. Called from the worker thread.
pub type SymbolDispatchCallback = Arc<dyn Fn(&DispatchEvent) + Send + Sync>;

/// Mutex-guarded observer slot.
///
/// Emission copies the current Arc before calling so the lock is never held
/// across user code, and catches panics so a faulty observer cannot take
/// down the worker.
#[derive(Default)]
pub struct CallbackSlot {
    slot: Mutex<Option<SymbolDispatchCallback>>,
}

impl CallbackSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or clear the observer.
    pub fn install(&self, callback: Option<SymbolDispatchCallback>) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = callback;
        }
    }

    pub fn is_installed(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Deliver an event to the observer, if any.
    pub fn emit(&self, event: &DispatchEvent) {
        let callback = match self.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        if let Some(callback) = callback {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(
                    "[outputs] dispatch.callback.error phase={:?} sequence={}",
                    event.phase, event.sequence
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(phase: DispatchPhase) -> DispatchEvent {
        DispatchEvent {
            phase,
            symbol: '.',
            sequence: 1,
            pattern_start_ms: 0.0,
            expected_timestamp_ms: 0.0,
            offset_ms: 0.0,
            duration_ms: 80.0,
            unit_ms: 80.0,
            tone_hz: 600.0,
            scheduled_timestamp_ms: 0.0,
            lead_ms: 0.0,
            actual_timestamp_ms: None,
            monotonic_timestamp_ms: None,
            start_skew_ms: None,
            batch_elapsed_ms: None,
            expected_since_prior_ms: None,
            since_prior_ms: None,
            native_flash_available: None,
            flash_handled_natively: None,
        }
    }

    #[test]
    fn test_serialization_omits_absent_fields() {
        let json = serde_json::to_string(&event(DispatchPhase::Scheduled)).unwrap();
        assert!(json.contains("\"phase\":\"scheduled\""));
        assert!(json.contains("\"symbol\":\".\""));
        assert!(!json.contains("actualTimestampMs"));
        assert!(!json.contains("startSkewMs"));
    }

    #[test]
    fn test_serialization_includes_actual_fields() {
        let mut actual = event(DispatchPhase::Actual);
        actual.actual_timestamp_ms = Some(12.5);
        actual.start_skew_ms = Some(-0.25);
        actual.flash_handled_natively = Some(true);
        let json = serde_json::to_string(&actual).unwrap();
        assert!(json.contains("\"phase\":\"actual\""));
        assert!(json.contains("\"actualTimestampMs\":12.5"));
        assert!(json.contains("\"startSkewMs\":-0.25"));
        assert!(json.contains("\"flashHandledNatively\":true"));
    }

    #[test]
    fn test_slot_install_and_clear() {
        let slot = CallbackSlot::new();
        assert!(!slot.is_installed());

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        slot.install(Some(Arc::new(move |_event| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })));
        assert!(slot.is_installed());

        slot.emit(&event(DispatchPhase::Scheduled));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        slot.install(None);
        slot.emit(&event(DispatchPhase::Scheduled));
        assert_eq!(hits.load(Ordering::SeqCst), 1, "cleared slot must not fire");
    }

    #[test]
    fn test_panicking_observer_is_contained() {
        let slot = CallbackSlot::new();
        slot.install(Some(Arc::new(|_event| panic!("observer bug"))));
        // Must not propagate.
        slot.emit(&event(DispatchPhase::Actual));
        assert!(slot.is_installed(), "slot survives a panicking observer");
    }
}
