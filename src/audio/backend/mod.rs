//! Platform audio backends behind a single trait
//!
//! On Android the engine drives an Oboe exclusive low-latency stream; on
//! desktop (Linux/macOS/Windows) a cpal output stream keeps `cargo test`
//! and CLI tooling honest without a device. The stub backend drives the
//! shared renderer by hand for deterministic tests.
//!
//! Failures never propagate out of the trait: a backend logs, leaves
//! `stream_ready` false on the shared state, and the engine's next call
//! retries lazily.

use crate::audio::tone::ToneShared;
use std::sync::Arc;

/// Trait implemented by platform-specific output backends.
///
/// The backend owns the stream exclusively; the render callback receives a
/// stream handle from the OS and does not retain it. Readiness is published
/// on [`ToneShared::stream_ready`] so callers and the error callback agree
/// on one flag.
pub trait AudioBackend: Send + Sync {
    /// Probe whether a low-latency output stream can be opened. The result
    /// is cached; subsequent calls are free.
    fn probe_support(&self) -> bool;

    /// Idempotent open+start. Publishes sample rate, resets gains to
    /// silence, latches the requested frequency. On failure the stream
    /// stays closed and `is_ready` stays false.
    fn ensure_open(&self, tone_hz: f64);

    /// Whether the stream is open and started. Cleared by `close` and by
    /// the stream error callback.
    fn is_ready(&self) -> bool;

    /// Output sample rate of the open stream, in Hz. Meaningful only
    /// while `is_ready` holds; retains the last opened rate otherwise.
    fn sample_rate(&self) -> f64;

    /// Request stop and release the stream handle.
    fn close(&self);
}

#[cfg(target_os = "android")]
mod oboe;
#[cfg(target_os = "android")]
pub use self::oboe::OboeBackend;

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use self::cpal::CpalBackend;

mod stub;
pub use stub::StubBackend;

#[cfg(target_os = "android")]
pub type PlatformBackend = OboeBackend;

#[cfg(not(target_os = "android"))]
pub type PlatformBackend = CpalBackend;

/// Construct the platform backend for the current target.
pub fn platform_backend(shared: Arc<ToneShared>) -> Arc<dyn AudioBackend> {
    Arc::new(PlatformBackend::new(shared))
}
