//! Oboe-backed output stream for Android
//!
//! Mono, 32-bit float, exclusive sharing, low-latency performance mode,
//! sonification content hints. The buffer size is pinned to one burst so
//! envelope changes land within a couple of milliseconds of audio.

use log::{debug, warn};
use oboe::{
    AudioOutputCallback, AudioOutputStreamSafe, AudioStream, AudioStreamAsync, AudioStreamBase,
    AudioStreamBuilder, ContentType, DataCallbackResult, Output, PerformanceMode, SharingMode,
    Usage,
};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex};

use crate::audio::callback::ToneRenderer;
use crate::audio::tone::ToneShared;

use super::AudioBackend;

/// Pull callback bridging Oboe to the shared renderer.
struct ToneCallback {
    renderer: ToneRenderer,
}

impl AudioOutputCallback for ToneCallback {
    type FrameType = (f32, oboe::Mono);

    fn on_audio_ready(
        &mut self,
        stream: &mut dyn AudioOutputStreamSafe,
        frames: &mut [f32],
    ) -> DataCallbackResult {
        let sample_rate = stream.get_sample_rate() as f64;
        self.renderer.render(sample_rate, 1, frames);
        DataCallbackResult::Continue
    }

    fn on_error_after_close(&mut self, _stream: &mut dyn AudioOutputStreamSafe, error: oboe::Error) {
        // The stream is already closed by the OS; mark it so the next
        // tone or pattern call reopens lazily. The handle itself is
        // released under the stream mutex on that reopen.
        warn!("[outputs-audio] stream.error error={:?}", error);
        self.renderer.shared().set_stream_ready(false);
    }
}

/// Android backend owning the Oboe output stream.
pub struct OboeBackend {
    shared: Arc<ToneShared>,
    stream: Mutex<Option<AudioStreamAsync<Output, ToneCallback>>>,
    support: OnceCell<bool>,
}

impl OboeBackend {
    pub fn new(shared: Arc<ToneShared>) -> Self {
        Self {
            shared,
            stream: Mutex::new(None),
            support: OnceCell::new(),
        }
    }

    fn open_stream(&self) -> Result<AudioStreamAsync<Output, ToneCallback>, oboe::Error> {
        let callback = ToneCallback {
            renderer: ToneRenderer::new(Arc::clone(&self.shared)),
        };
        AudioStreamBuilder::default()
            .set_performance_mode(PerformanceMode::LowLatency)
            .set_sharing_mode(SharingMode::Exclusive)
            .set_usage(Usage::Game)
            .set_content_type(ContentType::Sonification)
            .set_direction::<Output>()
            .set_channel_count::<oboe::Mono>()
            .set_format::<f32>()
            .set_callback(callback)
            .open_stream()
    }
}

impl AudioBackend for OboeBackend {
    fn probe_support(&self) -> bool {
        *self.support.get_or_init(|| {
            let probe = AudioStreamBuilder::default()
                .set_performance_mode(PerformanceMode::LowLatency)
                .set_sharing_mode(SharingMode::Exclusive)
                .set_direction::<Output>()
                .set_channel_count::<oboe::Mono>()
                .set_format::<f32>()
                .open_stream();
            match probe {
                Ok(stream) => {
                    drop(stream);
                    true
                }
                Err(error) => {
                    warn!("[outputs-audio] isSupported.failed error={:?}", error);
                    false
                }
            }
        })
    }

    fn ensure_open(&self, tone_hz: f64) {
        let mut guard = match self.stream.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("[outputs-audio] stream.open.failed error=lock_poisoned");
                self.shared.set_stream_ready(false);
                return;
            }
        };

        if self.shared.stream_ready() && guard.is_some() {
            self.shared.set_frequency(tone_hz);
            return;
        }

        // Drop any stale handle (left behind by an error callback).
        *guard = None;

        let mut stream = match self.open_stream() {
            Ok(stream) => stream,
            Err(error) => {
                warn!("[outputs-audio] stream.open.failed error={:?}", error);
                self.shared.set_stream_ready(false);
                return;
            }
        };

        let sample_rate = stream.get_sample_rate() as f64;
        self.shared.set_sample_rate(sample_rate);
        self.shared.reset_levels(tone_hz);

        let burst = stream.get_frames_per_burst();
        if burst > 0 {
            let _ = stream.set_buffer_size_in_frames(burst);
        }

        debug!(
            "[outputs-audio] stream.open sampleRate={:.1} burst={}",
            sample_rate, burst
        );

        if let Err(error) = stream.start() {
            warn!("[outputs-audio] stream.start.failed error={:?}", error);
            self.shared.set_stream_ready(false);
            return;
        }

        *guard = Some(stream);
        self.shared.set_stream_ready(true);
    }

    fn is_ready(&self) -> bool {
        self.shared.stream_ready()
    }

    fn sample_rate(&self) -> f64 {
        self.shared.sample_rate()
    }

    fn close(&self) {
        let mut guard = match self.stream.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };

        if let Some(mut stream) = guard.take() {
            if self.shared.stream_ready() {
                if let Err(error) = stream.stop() {
                    warn!("[outputs-audio] stream.stop.failed error={:?}", error);
                }
            }
        }

        self.shared.set_stream_ready(false);
        self.shared.reset_levels(self.shared.frequency());
    }
}
