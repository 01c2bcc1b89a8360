//! Timing telemetry: the scheduled plan and captured execution snapshots
//!
//! Two bounded buffers live with the engine. The schedule is replaced
//! atomically when a pattern is planned; snapshots form a FIFO of capacity
//! [`crate::config::TelemetryConfig::snapshot_capacity`] whose oldest
//! entries drop silently on overflow. Both are cleared at the start of
//! every pattern and again on cancellation.
//!
//! The compact JSON records polled by the host are hand-rendered so the
//! field order is stable and every timing value carries exactly three
//! decimal places.

pub mod events;

pub use events::{CallbackSlot, DispatchEvent, DispatchPhase, SymbolDispatchCallback};

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::morse::Symbol;
use crate::time;

/// One planned tone of a pattern, keyed by 1-based sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSymbol {
    pub sequence: u64,
    pub symbol: Symbol,
    /// Absolute expected start on the monotonic clock, in ms
    pub expected_timestamp_ms: f64,
    /// Start offset from the pattern start, in ms
    pub offset_ms: f64,
    /// Tone duration, in ms
    pub duration_ms: f64,
}

/// Observed execution of one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub sequence: u64,
    pub symbol: Symbol,
    /// Expected audible start (wake time plus dispatch lead), in ms
    pub timestamp_ms: f64,
    pub duration_ms: f64,
    pub pattern_start_ms: f64,
    pub expected_timestamp_ms: f64,
    /// `timestamp_ms - expected_timestamp_ms`
    pub start_skew_ms: f64,
    /// `timestamp_ms - pattern_start_ms`
    pub batch_elapsed_ms: f64,
    /// Planned distance from the prior tone's start (0 for the first)
    pub expected_since_prior_ms: f64,
    /// Observed distance from the prior tone's start (0 for the first)
    pub since_prior_ms: f64,
}

fn ms(value: f64) -> String {
    format!("{:.3}", value)
}

impl Snapshot {
    /// Compact JSON record polled by the host. `age_ms` is computed against
    /// the clock at render time.
    pub fn to_json(&self, now_ms: f64) -> String {
        format!(
            concat!(
                "{{\"sequence\":{},\"symbol\":\"{}\",\"timestampMs\":{},",
                "\"durationMs\":{},\"patternStartMs\":{},\"expectedTimestampMs\":{},",
                "\"startSkewMs\":{},\"batchElapsedMs\":{},\"expectedSincePriorMs\":{},",
                "\"sincePriorMs\":{},\"ageMs\":{}}}"
            ),
            self.sequence,
            self.symbol.glyph(),
            ms(self.timestamp_ms),
            ms(self.duration_ms),
            ms(self.pattern_start_ms),
            ms(self.expected_timestamp_ms),
            ms(self.start_skew_ms),
            ms(self.batch_elapsed_ms),
            ms(self.expected_since_prior_ms),
            ms(self.since_prior_ms),
            ms((now_ms - self.timestamp_ms).max(0.0)),
        )
    }
}

struct SnapshotBuffer {
    snapshots: VecDeque<Snapshot>,
    pattern_start_ms: f64,
}

/// Append-only bounded telemetry buffers.
pub struct TelemetryStore {
    capacity: usize,
    schedule: Mutex<Vec<ScheduledSymbol>>,
    buffer: Mutex<SnapshotBuffer>,
}

impl TelemetryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            schedule: Mutex::new(Vec::new()),
            buffer: Mutex::new(SnapshotBuffer {
                snapshots: VecDeque::new(),
                pattern_start_ms: 0.0,
            }),
        }
    }

    /// Replace the schedule and reset snapshots for a new pattern.
    pub fn install_schedule(&self, schedule: Vec<ScheduledSymbol>, pattern_start_ms: f64) {
        if let Ok(mut guard) = self.schedule.lock() {
            *guard = schedule;
        }
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.snapshots.clear();
            buffer.pattern_start_ms = pattern_start_ms;
        }
    }

    /// Drop schedule and snapshots (cancellation path).
    pub fn clear(&self) {
        if let Ok(mut guard) = self.schedule.lock() {
            guard.clear();
        }
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.snapshots.clear();
            buffer.pattern_start_ms = 0.0;
        }
    }

    pub fn scheduled_symbols(&self) -> Vec<ScheduledSymbol> {
        self.schedule
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn pattern_start_ms(&self) -> f64 {
        self.buffer
            .lock()
            .map(|buffer| buffer.pattern_start_ms)
            .unwrap_or(0.0)
    }

    /// JSON array of the current schedule, in sequence order.
    pub fn schedule_json(&self) -> String {
        let entries = self.scheduled_symbols();
        let mut out = String::from("[");
        for (index, entry) in entries.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            out.push_str(&format!(
                concat!(
                    "{{\"sequence\":{},\"symbol\":\"{}\",\"expectedTimestampMs\":{},",
                    "\"offsetMs\":{},\"durationMs\":{}}}"
                ),
                entry.sequence,
                entry.symbol.glyph(),
                ms(entry.expected_timestamp_ms),
                ms(entry.offset_ms),
                ms(entry.duration_ms),
            ));
        }
        out.push(']');
        out
    }

    /// Append a snapshot, dropping the oldest when full.
    pub fn push_snapshot(&self, snapshot: Snapshot) {
        if let Ok(mut buffer) = self.buffer.lock() {
            if buffer.snapshots.len() == self.capacity {
                buffer.snapshots.pop_front();
            }
            buffer.snapshots.push_back(snapshot);
        }
    }

    pub fn snapshot_count(&self) -> usize {
        self.buffer
            .lock()
            .map(|buffer| buffer.snapshots.len())
            .unwrap_or(0)
    }

    /// Pop the oldest snapshot and render it, or `None` when empty.
    pub fn latest_symbol_info(&self) -> Option<String> {
        let snapshot = self
            .buffer
            .lock()
            .ok()
            .and_then(|mut buffer| buffer.snapshots.pop_front())?;
        Some(snapshot.to_json(time::now_ms()))
    }
}
