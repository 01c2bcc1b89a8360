//! Pattern planning and the playback worker
//!
//! Planning is synchronous and happens once at `play_morse` entry: the
//! pattern is walked into a timestamped schedule keyed by 1-based sequence
//! over the tone symbols. The worker (see [`worker`]) then paces the
//! pattern against the monotonic clock.
//!
//! Offset accumulation rules:
//! - a dot adds 1 unit of tone, a dash 3 units
//! - after a tone, 1 unit of intra-symbol silence is added when any symbol
//!   follows
//! - an explicit gap adds 3 units of silence without emitting an entry
//!
//! Leading and trailing gaps are plain 3-unit silences in both positions.

pub mod worker;

pub use worker::{PlaybackController, WorkerContext};

use crate::morse::{Symbol, LETTER_GAP_UNITS, SYMBOL_GAP_UNITS};
use crate::telemetry::ScheduledSymbol;

/// Build the timestamped schedule for a pattern.
///
/// Gaps contribute silence but no entry; the returned vector holds one
/// entry per tone in pattern order.
pub fn build_schedule(
    pattern: &[Symbol],
    unit_ms: f64,
    pattern_start_ms: f64,
) -> Vec<ScheduledSymbol> {
    let mut schedule = Vec::with_capacity(pattern.len());
    let mut offset_ms = 0.0;
    let mut sequence = 0u64;

    for (index, symbol) in pattern.iter().enumerate() {
        match symbol.tone_units() {
            Some(units) => {
                let duration_ms = units * unit_ms;
                sequence += 1;
                schedule.push(ScheduledSymbol {
                    sequence,
                    symbol: *symbol,
                    expected_timestamp_ms: pattern_start_ms + offset_ms,
                    offset_ms,
                    duration_ms,
                });
                offset_ms += duration_ms;
                if index + 1 < pattern.len() {
                    offset_ms += SYMBOL_GAP_UNITS * unit_ms;
                }
            }
            None => {
                offset_ms += LETTER_GAP_UNITS * unit_ms;
            }
        }
    }

    schedule
}

/// Dispatch lead for one tone: how far before its audio start the worker
/// wakes to absorb actuator latency and wake jitter.
///
/// The lead never exceeds the configured maximum, never pre-dates the
/// pattern start, and never eats into a silence shorter than
/// `min_dispatch_offset_ms`. The first tone always gets 0.
pub fn compute_lead_ms(
    max_lead_ms: f64,
    min_dispatch_offset_ms: f64,
    expected_start_offset_ms: f64,
    available_gap_lead_ms: f64,
) -> f64 {
    max_lead_ms
        .min(expected_start_offset_ms)
        .min(available_gap_lead_ms - min_dispatch_offset_ms)
        .clamp(0.0, max_lead_ms.max(0.0))
}
