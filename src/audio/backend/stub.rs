//! Deterministic stub backend for tests
//!
//! Maintains the same readiness and level semantics as the real backends
//! but performs no audio I/O. Tests pump the renderer by hand to observe
//! envelope behavior frame by frame.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::callback::ToneRenderer;
use crate::audio::tone::ToneShared;

use super::AudioBackend;

const STUB_SAMPLE_RATE: f64 = 48_000.0;

pub struct StubBackend {
    shared: Arc<ToneShared>,
    renderer: Mutex<ToneRenderer>,
    open_count: AtomicU32,
}

impl StubBackend {
    pub fn new(shared: Arc<ToneShared>) -> Self {
        let renderer = ToneRenderer::new(Arc::clone(&shared));
        Self {
            shared,
            renderer: Mutex::new(renderer),
            open_count: AtomicU32::new(0),
        }
    }

    /// Drive the render callback manually, as the OS pull would.
    pub fn pump(&self, frames: &mut [f32]) {
        if let Ok(mut renderer) = self.renderer.lock() {
            renderer.render(self.shared.sample_rate(), 1, frames);
        }
    }

    /// How many times `ensure_open` actually (re)opened the stream.
    pub fn open_count(&self) -> u32 {
        self.open_count.load(Ordering::Relaxed)
    }
}

impl AudioBackend for StubBackend {
    fn probe_support(&self) -> bool {
        true
    }

    fn ensure_open(&self, tone_hz: f64) {
        if self.shared.stream_ready() {
            self.shared.set_frequency(tone_hz);
            return;
        }
        self.open_count.fetch_add(1, Ordering::Relaxed);
        self.shared.set_sample_rate(STUB_SAMPLE_RATE);
        self.shared.reset_levels(tone_hz);
        self.shared.set_stream_ready(true);
    }

    fn is_ready(&self) -> bool {
        self.shared.stream_ready()
    }

    fn sample_rate(&self) -> f64 {
        self.shared.sample_rate()
    }

    fn close(&self) {
        self.shared.set_stream_ready(false);
        self.shared.reset_levels(self.shared.frequency());
    }
}
