// Error types for the Morse outputs engine
//
// Public engine calls never surface errors to the host; failures are logged
// and latched (stream readiness, actuator availability). These types exist
// for the internal seams: backends, bridge calls, and lock acquisition.

use log::error;
use std::fmt;

/// Error code constants shared across the FFI boundary.
///
/// Error code range: 2001-2007
pub struct OutputsErrorCodes {}

impl OutputsErrorCodes {
    /// Low-latency output stream cannot be opened on this device
    pub const UNSUPPORTED: i32 = 2001;

    /// Failed to open the output stream
    pub const STREAM_OPEN_FAILED: i32 = 2002;

    /// Stream opened but refused to start
    pub const STREAM_START_FAILED: i32 = 2003;

    /// Operation requires an open stream
    pub const STREAM_CLOSED: i32 = 2004;

    /// Torch / overlay / vibrator call failed on the host
    pub const ACTUATOR_UNAVAILABLE: i32 = 2005;

    /// Mutex was poisoned
    pub const LOCK_POISONED: i32 = 2006;

    /// Playback request failed validation
    pub const INVALID_REQUEST: i32 = 2007;
}

/// Standard way to get error codes and messages from engine error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Log an engine error with structured context.
///
/// Non-blocking; never panics.
pub fn log_outputs_error(err: &OutputsError, context: &str) {
    error!(
        "[outputs] error in {}: code={} message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the audio backend, the actuator bridge, and the
/// playback machinery.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputsError {
    /// The device cannot open a low-latency output stream
    Unsupported,

    /// Failed to open the output stream
    StreamOpenFailed { reason: String },

    /// Stream opened but refused to start
    StreamStartFailed { reason: String },

    /// Operation requires an open stream
    StreamClosed,

    /// A host actuator call failed
    ActuatorUnavailable { actuator: String },

    /// Mutex was poisoned
    LockPoisoned { component: String },

    /// Playback request failed validation
    InvalidRequest { reason: String },
}

impl ErrorCode for OutputsError {
    fn code(&self) -> i32 {
        match self {
            OutputsError::Unsupported => OutputsErrorCodes::UNSUPPORTED,
            OutputsError::StreamOpenFailed { .. } => OutputsErrorCodes::STREAM_OPEN_FAILED,
            OutputsError::StreamStartFailed { .. } => OutputsErrorCodes::STREAM_START_FAILED,
            OutputsError::StreamClosed => OutputsErrorCodes::STREAM_CLOSED,
            OutputsError::ActuatorUnavailable { .. } => OutputsErrorCodes::ACTUATOR_UNAVAILABLE,
            OutputsError::LockPoisoned { .. } => OutputsErrorCodes::LOCK_POISONED,
            OutputsError::InvalidRequest { .. } => OutputsErrorCodes::INVALID_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            OutputsError::Unsupported => {
                "Low-latency audio output is not supported on this device".to_string()
            }
            OutputsError::StreamOpenFailed { reason } => {
                format!("Failed to open output stream: {}", reason)
            }
            OutputsError::StreamStartFailed { reason } => {
                format!("Output stream refused to start: {}", reason)
            }
            OutputsError::StreamClosed => "Output stream is closed".to_string(),
            OutputsError::ActuatorUnavailable { actuator } => {
                format!("Actuator unavailable: {}", actuator)
            }
            OutputsError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            OutputsError::InvalidRequest { reason } => {
                format!("Invalid playback request: {}", reason)
            }
        }
    }
}

impl fmt::Display for OutputsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputsError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for OutputsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(OutputsError::Unsupported.code(), OutputsErrorCodes::UNSUPPORTED);
        assert_eq!(
            OutputsError::StreamOpenFailed {
                reason: "busy".to_string()
            }
            .code(),
            OutputsErrorCodes::STREAM_OPEN_FAILED
        );
        assert_eq!(OutputsError::StreamClosed.code(), OutputsErrorCodes::STREAM_CLOSED);
        assert_eq!(
            OutputsError::LockPoisoned {
                component: "stream".to_string()
            }
            .code(),
            OutputsErrorCodes::LOCK_POISONED
        );
    }

    #[test]
    fn test_error_messages() {
        let err = OutputsError::StreamOpenFailed {
            reason: "device busy".to_string(),
        };
        assert!(err.message().contains("device busy"));

        let err = OutputsError::ActuatorUnavailable {
            actuator: "overlay".to_string(),
        };
        assert!(err.message().contains("overlay"));
    }

    #[test]
    fn test_error_display_includes_code() {
        let err = OutputsError::Unsupported;
        let display = format!("{}", err);
        assert!(display.contains("2001"));
    }
}
