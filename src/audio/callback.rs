//! Render core shared by every output backend
//!
//! [`ToneRenderer`] is the body of the pull callback. It reads the shared
//! atomics once per call, runs the envelope and oscillator per frame,
//! replicates the sample to every channel, and writes phase and gain back.
//!
//! # Real-Time Safety
//! All operations here are:
//! - Lock-free (scalar atomic loads and stores only)
//! - Allocation-free
//! - Bounded (one pass over the frame buffer)

use std::sync::Arc;

use super::envelope::advance_gain;
use super::oscillator::Oscillator;
use super::tone::ToneShared;

/// Per-stream render state. One renderer lives inside each platform
/// callback; the phase dies with the stream, so a reopen starts at zero.
pub struct ToneRenderer {
    shared: Arc<ToneShared>,
    oscillator: Oscillator,
}

impl ToneRenderer {
    pub fn new(shared: Arc<ToneShared>) -> Self {
        Self {
            shared,
            oscillator: Oscillator::new(),
        }
    }

    pub fn shared(&self) -> &Arc<ToneShared> {
        &self.shared
    }

    /// Fill an interleaved buffer with `frames.len() / channel_count`
    /// frames of enveloped sine.
    ///
    /// `sample_rate` comes from the stream when it reports one, otherwise
    /// the last rate recorded on the shared state is used.
    pub fn render(&mut self, sample_rate: f64, channel_count: usize, frames: &mut [f32]) {
        if frames.is_empty() || channel_count == 0 {
            return;
        }

        let sample_rate = if sample_rate > 0.0 {
            sample_rate
        } else {
            self.shared.sample_rate()
        };

        // Acquire pairs with the release store publishing the envelope.
        let target = self.shared.target_gain_acquire();
        let frequency = self.shared.frequency();
        let step_up = self.shared.step_up();
        let step_down = self.shared.step_down();
        let mut gain = self.shared.current_gain();

        let increment = Oscillator::phase_increment(frequency, sample_rate);
        let frame_count = frames.len() / channel_count;

        for frame in 0..frame_count {
            gain = advance_gain(gain, target, step_up, step_down);
            let sample = gain * self.oscillator.next_sample(increment);
            let base = frame * channel_count;
            for channel in 0..channel_count {
                frames[base + channel] = sample;
            }
        }

        self.shared.set_current_gain(gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::envelope::EnvelopeConfig;

    fn renderer_at(sample_rate: f64) -> (Arc<ToneShared>, ToneRenderer) {
        let shared = Arc::new(ToneShared::new());
        shared.set_sample_rate(sample_rate);
        let renderer = ToneRenderer::new(Arc::clone(&shared));
        (shared, renderer)
    }

    #[test]
    fn test_silent_when_target_is_zero() {
        let (_, mut renderer) = renderer_at(48_000.0);
        let mut buffer = vec![1.0_f32; 256];
        renderer.render(48_000.0, 1, &mut buffer);
        assert!(buffer.iter().all(|&s| s == 0.0), "buffer should render silence");
    }

    #[test]
    fn test_gain_ramps_to_target_within_attack() {
        let (shared, mut renderer) = renderer_at(48_000.0);
        shared.raise(
            600.0,
            1.0,
            &EnvelopeConfig {
                attack_ms: 2.5,
                release_ms: 6.0,
            },
        );
        // 2.5 ms at 48 kHz is 120 frames; render a little more.
        let mut buffer = vec![0.0_f32; 256];
        renderer.render(48_000.0, 1, &mut buffer);
        assert_eq!(shared.current_gain(), 1.0, "gain should reach target");
    }

    #[test]
    fn test_zero_attack_reaches_target_in_one_frame() {
        let (shared, mut renderer) = renderer_at(48_000.0);
        shared.raise(
            600.0,
            0.7,
            &EnvelopeConfig {
                attack_ms: 0.0,
                release_ms: 0.0,
            },
        );
        let mut buffer = vec![0.0_f32; 1];
        renderer.render(48_000.0, 1, &mut buffer);
        assert_eq!(shared.current_gain(), 0.7);
    }

    #[test]
    fn test_release_returns_to_silence() {
        let (shared, mut renderer) = renderer_at(48_000.0);
        let envelope = EnvelopeConfig::default();
        shared.raise(600.0, 1.0, &envelope);
        let mut buffer = vec![0.0_f32; 512];
        renderer.render(48_000.0, 1, &mut buffer);

        shared.release(&envelope);
        renderer.render(48_000.0, 1, &mut buffer);
        assert_eq!(shared.current_gain(), 0.0, "release should reach silence");
        assert_eq!(buffer[buffer.len() - 1], 0.0);
    }

    #[test]
    fn test_channel_replication() {
        let (shared, mut renderer) = renderer_at(48_000.0);
        shared.raise(
            600.0,
            1.0,
            &EnvelopeConfig {
                attack_ms: 0.0,
                release_ms: 0.0,
            },
        );
        let mut buffer = vec![0.0_f32; 64];
        renderer.render(48_000.0, 2, &mut buffer);
        for frame in buffer.chunks(2) {
            assert_eq!(frame[0], frame[1], "channels must carry identical samples");
        }
    }

    #[test]
    fn test_peak_amplitude_tracks_gain() {
        let (shared, mut renderer) = renderer_at(48_000.0);
        shared.raise(
            600.0,
            0.5,
            &EnvelopeConfig {
                attack_ms: 0.0,
                release_ms: 0.0,
            },
        );
        // Two full cycles at 600 Hz / 48 kHz.
        let mut buffer = vec![0.0_f32; 160];
        renderer.render(48_000.0, 1, &mut buffer);
        let peak = buffer.iter().fold(0.0_f32, |acc, &s| acc.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.01, "peak {} should approach gain 0.5", peak);
    }

    #[test]
    fn test_empty_buffer_is_harmless() {
        let (_, mut renderer) = renderer_at(48_000.0);
        let mut buffer: Vec<f32> = Vec::new();
        renderer.render(48_000.0, 1, &mut buffer);
        renderer.render(48_000.0, 0, &mut [0.0; 4]);
    }
}
