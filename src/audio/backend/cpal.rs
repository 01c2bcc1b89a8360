//! CPAL output backend for desktop platforms (Linux, macOS, Windows)
//!
//! Since cpal's `Stream` is not `Send + Sync`, a dedicated thread owns the
//! stream and runs until signaled to stop. The data callback feeds the same
//! renderer the Android path uses, so envelope and oscillator behavior is
//! identical across platforms.

use log::{info, warn};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};

use crate::audio::callback::ToneRenderer;
use crate::audio::tone::ToneShared;
use crate::error::OutputsError;

use super::AudioBackend;

/// Desktop backend owning a cpal output stream on its own thread.
pub struct CpalBackend {
    shared: Arc<ToneShared>,
    support: OnceCell<bool>,
    shutdown: Arc<AtomicBool>,
    stream_thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpalBackend {
    pub fn new(shared: Arc<ToneShared>) -> Self {
        Self {
            shared,
            support: OnceCell::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            stream_thread: Mutex::new(None),
        }
    }

    fn join_stream_thread(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = self.stream_thread.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
    }
}

impl AudioBackend for CpalBackend {
    fn probe_support(&self) -> bool {
        *self.support.get_or_init(|| {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(device) => device,
                None => {
                    warn!("[outputs-audio] isSupported.failed error=no_output_device");
                    return false;
                }
            };
            match device.default_output_config() {
                Ok(_) => true,
                Err(error) => {
                    warn!("[outputs-audio] isSupported.failed error={}", error);
                    false
                }
            }
        })
    }

    fn ensure_open(&self, tone_hz: f64) {
        {
            let guard = match self.stream_thread.lock() {
                Ok(guard) => guard,
                Err(_) => {
                    self.shared.set_stream_ready(false);
                    return;
                }
            };
            if self.shared.stream_ready() && guard.is_some() {
                self.shared.set_frequency(tone_hz);
                return;
            }
        }

        // Tear down any dead stream thread before reopening.
        self.join_stream_thread();
        self.shutdown.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let shutdown = Arc::clone(&self.shutdown);
        let (open_tx, open_rx) = mpsc::channel::<Result<f64, OutputsError>>();

        let handle = thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(device) => device,
                None => {
                    let _ = open_tx.send(Err(OutputsError::StreamOpenFailed {
                        reason: "no output device available".to_string(),
                    }));
                    return;
                }
            };

            let supported_config = match device.default_output_config() {
                Ok(config) => config,
                Err(error) => {
                    let _ = open_tx.send(Err(OutputsError::StreamOpenFailed {
                        reason: format!("default output config: {}", error),
                    }));
                    return;
                }
            };

            let sample_rate = supported_config.sample_rate().0 as f64;
            let channels = supported_config.channels() as usize;
            let config = StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let mut renderer = ToneRenderer::new(Arc::clone(&shared));
            let err_fn = |error| warn!("[outputs-audio] stream.error error={}", error);

            let stream = match supported_config.sample_format() {
                SampleFormat::F32 => device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        renderer.render(sample_rate, channels, data);
                    },
                    err_fn,
                    None,
                ),
                other => {
                    let _ = open_tx.send(Err(OutputsError::StreamOpenFailed {
                        reason: format!("unsupported sample format: {:?}", other),
                    }));
                    return;
                }
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(error) => {
                    let _ = open_tx.send(Err(OutputsError::StreamOpenFailed {
                        reason: format!("build output stream: {}", error),
                    }));
                    return;
                }
            };

            if let Err(error) = stream.play() {
                let _ = open_tx.send(Err(OutputsError::StreamStartFailed {
                    reason: format!("{}", error),
                }));
                return;
            }

            let _ = open_tx.send(Ok(sample_rate));

            // The stream lives in this thread's scope until shutdown.
            while !shutdown.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(50));
            }
        });

        match open_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(sample_rate)) => {
                self.shared.set_sample_rate(sample_rate);
                self.shared.reset_levels(tone_hz);
                self.shared.set_stream_ready(true);
                if let Ok(mut guard) = self.stream_thread.lock() {
                    *guard = Some(handle);
                }
                info!("[outputs-audio] stream.open sampleRate={:.1}", sample_rate);
            }
            Ok(Err(error)) => {
                warn!("[outputs-audio] stream.open.failed error={}", error);
                self.shared.set_stream_ready(false);
                self.shutdown.store(true, Ordering::SeqCst);
                let _ = handle.join();
            }
            Err(_) => {
                warn!("[outputs-audio] stream.open.failed error=open_timeout");
                self.shared.set_stream_ready(false);
                self.shutdown.store(true, Ordering::SeqCst);
                let _ = handle.join();
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.shared.stream_ready()
    }

    fn sample_rate(&self) -> f64 {
        self.shared.sample_rate()
    }

    fn close(&self) {
        self.join_stream_thread();
        self.shared.set_stream_ready(false);
        self.shared.reset_levels(self.shared.frequency());
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.join_stream_thread();
    }
}
