//! Lock-free tone state shared with the audio callback
//!
//! Each value the scheduler or facade shares with the real-time callback is
//! an independent scalar atomic. Floats ride in integer atomics via
//! `to_bits`/`from_bits`. A pointer graph or queue in this path would not be
//! real-time safe; the callback performs only arithmetic on these scalars.
//!
//! Publish protocol for envelope changes: write `step_up`, `step_down`, and
//! `frequency` with relaxed order, then store `target_gain` with release
//! order. The callback's acquire load of `target_gain` makes the staged
//! values visible together.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use super::envelope::{ramp_step, EnvelopeConfig};

/// Scalar atomics bridging the caller/worker domains and the audio callback.
pub struct ToneShared {
    /// Oscillator frequency in Hz (f64 bits)
    frequency: AtomicU64,
    /// Output sample rate in Hz (f64 bits), written when a stream opens
    sample_rate: AtomicU64,
    /// Gain the envelope is ramping toward (f32 bits)
    target_gain: AtomicU32,
    /// Live gain, modified only by the audio callback (f32 bits)
    current_gain: AtomicU32,
    /// Per-frame gain increment while ramping up (f32 bits)
    step_up: AtomicU32,
    /// Per-frame gain decrement while ramping down (f32 bits)
    step_down: AtomicU32,
    /// Whether the scheduler currently holds a tone up
    tone_active: AtomicBool,
    /// Whether the output stream is open and started
    stream_ready: AtomicBool,
}

impl ToneShared {
    pub fn new() -> Self {
        Self {
            frequency: AtomicU64::new(600.0_f64.to_bits()),
            sample_rate: AtomicU64::new(48_000.0_f64.to_bits()),
            target_gain: AtomicU32::new(0.0_f32.to_bits()),
            current_gain: AtomicU32::new(0.0_f32.to_bits()),
            step_up: AtomicU32::new(0.001_f32.to_bits()),
            step_down: AtomicU32::new(0.001_f32.to_bits()),
            tone_active: AtomicBool::new(false),
            stream_ready: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn frequency(&self) -> f64 {
        f64::from_bits(self.frequency.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_frequency(&self, hz: f64) {
        self.frequency.store(hz.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.sample_rate.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_sample_rate(&self, hz: f64) {
        self.sample_rate.store(hz.to_bits(), Ordering::Relaxed);
    }

    /// Acquire load pairing with the release store in [`raise`]/[`release`].
    ///
    /// [`raise`]: ToneShared::raise
    /// [`release`]: ToneShared::release
    #[inline]
    pub fn target_gain_acquire(&self) -> f32 {
        f32::from_bits(self.target_gain.load(Ordering::Acquire))
    }

    #[inline]
    pub fn current_gain(&self) -> f32 {
        f32::from_bits(self.current_gain.load(Ordering::Relaxed))
    }

    /// Written back by the audio callback after each buffer.
    #[inline]
    pub fn set_current_gain(&self, gain: f32) {
        self.current_gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn step_up(&self) -> f32 {
        f32::from_bits(self.step_up.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn step_down(&self) -> f32 {
        f32::from_bits(self.step_down.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn tone_active(&self) -> bool {
        self.tone_active.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_tone_active(&self, active: bool) {
        self.tone_active.store(active, Ordering::Relaxed);
    }

    #[inline]
    pub fn stream_ready(&self) -> bool {
        self.stream_ready.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_stream_ready(&self, ready: bool) {
        self.stream_ready.store(ready, Ordering::Release);
    }

    /// Reset gains and target so a freshly opened stream starts silent.
    pub fn reset_levels(&self, frequency_hz: f64) {
        self.set_frequency(frequency_hz);
        self.target_gain.store(0.0_f32.to_bits(), Ordering::Relaxed);
        self.current_gain.store(0.0_f32.to_bits(), Ordering::Relaxed);
    }

    /// Program the envelope to ramp toward `target` and publish it.
    ///
    /// The up step is sized from the gain still to climb (or the full target
    /// when already at or above it, so a retrigger keeps the configured
    /// attack), the down step from the larger of target and current gain so
    /// a release from either level completes in `release_ms`.
    pub fn raise(&self, frequency_hz: f64, target: f32, envelope: &EnvelopeConfig) {
        let sample_rate = self.sample_rate();
        let current = self.current_gain();
        let delta = (target - current).max(0.0);
        let up_magnitude = if delta > 0.0 { delta } else { target };
        let up = ramp_step(up_magnitude, envelope.attack_ms, sample_rate);
        let down = ramp_step(target.max(current), envelope.release_ms, sample_rate);

        self.step_up.store(up.to_bits(), Ordering::Relaxed);
        self.step_down.store(down.to_bits(), Ordering::Relaxed);
        self.set_frequency(frequency_hz);
        self.target_gain.store(target.to_bits(), Ordering::Release);
    }

    /// Program the envelope to ramp to silence and publish it.
    pub fn release(&self, envelope: &EnvelopeConfig) {
        let sample_rate = self.sample_rate();
        let current = self.current_gain().max(0.0);
        let down = ramp_step(current, envelope.release_ms, sample_rate);

        self.step_down.store(down.to_bits(), Ordering::Relaxed);
        self.target_gain.store(0.0_f32.to_bits(), Ordering::Release);
    }
}

impl Default for ToneShared {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_atomics_roundtrip() {
        let shared = ToneShared::new();
        shared.set_frequency(432.5);
        assert_eq!(shared.frequency(), 432.5);
        shared.set_sample_rate(44_100.0);
        assert_eq!(shared.sample_rate(), 44_100.0);
        shared.set_current_gain(0.75);
        assert_eq!(shared.current_gain(), 0.75);
    }

    #[test]
    fn test_raise_publishes_target_and_steps() {
        let shared = ToneShared::new();
        shared.set_sample_rate(48_000.0);
        let envelope = EnvelopeConfig {
            attack_ms: 2.5,
            release_ms: 6.0,
        };
        shared.raise(600.0, 1.0, &envelope);

        assert_eq!(shared.target_gain_acquire(), 1.0);
        assert_eq!(shared.frequency(), 600.0);
        // 1.0 spread over 2.5 ms of 48 kHz frames: 1 / 120.
        assert!((shared.step_up() - 1.0 / 120.0).abs() < 1e-9);
        // 1.0 spread over 6 ms of frames: 1 / 288.
        assert!((shared.step_down() - 1.0 / 288.0).abs() < 1e-9);
    }

    #[test]
    fn test_raise_from_partial_gain_uses_delta() {
        let shared = ToneShared::new();
        shared.set_sample_rate(48_000.0);
        shared.set_current_gain(0.4);
        let envelope = EnvelopeConfig {
            attack_ms: 2.5,
            release_ms: 6.0,
        };
        shared.raise(600.0, 1.0, &envelope);
        // Remaining climb is 0.6 over the attack window.
        assert!((shared.step_up() - 0.6 / 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_release_targets_silence() {
        let shared = ToneShared::new();
        shared.set_sample_rate(48_000.0);
        shared.set_current_gain(0.8);
        let envelope = EnvelopeConfig {
            attack_ms: 2.5,
            release_ms: 6.0,
        };
        shared.release(&envelope);
        assert_eq!(shared.target_gain_acquire(), 0.0);
        assert!((shared.step_down() - 0.8 / 288.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_levels_zeroes_gains() {
        let shared = ToneShared::new();
        shared.set_current_gain(0.9);
        shared.raise(700.0, 1.0, &EnvelopeConfig::default());
        shared.reset_levels(500.0);
        assert_eq!(shared.frequency(), 500.0);
        assert_eq!(shared.current_gain(), 0.0);
        assert_eq!(shared.target_gain_acquire(), 0.0);
    }
}
