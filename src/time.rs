//! Monotonic clock helpers
//!
//! Every timestamp the engine reports (telemetry snapshots, dispatch events,
//! schedule entries) comes from a single process-wide monotonic epoch so
//! values from different threads are directly comparable. Wall-clock time is
//! never used for scheduling.

use once_cell::sync::Lazy;
use std::time::Instant;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds elapsed since the crate's monotonic epoch.
///
/// The epoch is captured on first use; only differences between values are
/// meaningful.
#[inline]
pub fn now_ms() -> f64 {
    EPOCH.elapsed().as_secs_f64() * 1000.0
}

/// Capture an [`Instant`] together with its epoch-relative milliseconds.
///
/// The pair is taken back to back so the f64 timestamp and the `Instant`
/// describe the same moment to within clock-read cost.
#[inline]
pub fn now_pair() -> (Instant, f64) {
    let epoch = *EPOCH;
    let instant = Instant::now();
    let ms = instant.duration_since(epoch).as_secs_f64() * 1000.0;
    (instant, ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_now_ms_is_monotonic() {
        let a = now_ms();
        thread::sleep(Duration::from_millis(2));
        let b = now_ms();
        assert!(b > a, "clock must advance: {} then {}", a, b);
    }

    #[test]
    fn test_now_pair_is_consistent() {
        let (instant, ms) = now_pair();
        let again = instant.duration_since(*EPOCH).as_secs_f64() * 1000.0;
        assert!((again - ms).abs() < 1.0, "pair drifted: {} vs {}", ms, again);
    }
}
