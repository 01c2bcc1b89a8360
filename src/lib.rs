// Morse Outputs Core - real-time Morse playback engine
// Tone synthesis, flash/torch/haptic dispatch, and timing telemetry with a
// lock-free audio path.

pub mod actuators;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod morse;
pub mod scheduler;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod time;

pub use actuators::{ActuatorBridge, DeviceActuator, NullActuator};
pub use audio::{AudioBackend, EnvelopeConfig, ToneEnvelopeOptions, ToneShared};
pub use config::EngineConfig;
pub use engine::{OutputsEngine, PlaybackRequest, ToneStartOptions};
pub use error::{ErrorCode, OutputsError};
pub use morse::{parse_pattern, Pattern, Symbol};
pub use telemetry::{DispatchEvent, DispatchPhase, ScheduledSymbol, SymbolDispatchCallback};

/// Initialize Android logging
#[cfg(target_os = "android")]
pub fn init_logging() {
    use log::info;
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("MorseOutputs"),
    );
    info!("Android logger initialized");
}

/// Initialize env_logger for desktop hosts and test harnesses. Safe to
/// call more than once.
#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

/// JNI_OnLoad is called when the native library is loaded by Android.
/// This function initializes the Android context required by oboe-rs.
///
/// # Safety
/// Called by the Android runtime when System.loadLibrary() executes. The
/// JavaVM pointer is guaranteed valid for the lifetime of the process. The
/// ndk context must be installed before any Oboe operation to prevent
/// "android context was not initialized" panics.
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    vm: jni::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    use log::info;

    init_logging();
    info!("JNI_OnLoad called - initializing Android context");

    // SAFETY: the JavaVM pointer stays valid for the process lifetime.
    unsafe {
        ndk_context::initialize_android_context(vm.get_java_vm_pointer() as *mut _);
    }

    info!("Android context initialized successfully");
    jni::sys::JNI_VERSION_1_6
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_module_structure() {
        // Verify all modules are accessible; ensures the crate compiles
        // with the intended module hierarchy.
    }
}
