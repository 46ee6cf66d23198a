// Detector error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Detector error code constants
///
/// Single source of truth for the numeric codes a host layer reports.
///
/// Error code range: 1001-1006
pub struct DetectorErrorCodes {}

impl DetectorErrorCodes {
    /// Sample rate outside the supported range
    pub const INVALID_SAMPLE_RATE: i32 = 1001;

    /// Window buffers could not be reserved
    pub const BUFFER_ALLOCATION_FAILED: i32 = 1002;

    /// Analysis thread could not be started
    pub const WORKER_SPAWN_FAILED: i32 = 1003;

    /// Parameter key is not recognised
    pub const UNKNOWN_PARAM: i32 = 1004;

    /// Parameter value could not be parsed
    pub const INVALID_PARAM_VALUE: i32 = 1005;

    /// Analysis thread panicked before it was joined
    pub const WORKER_PANICKED: i32 = 1006;
}

/// Log a detector error with structured context
///
/// This function logs detector errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_detector_error(err: &KeyDetectError, context: &str) {
    error!(
        "Detector error in {}: code={}, component=KeyDetector, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the key detector
///
/// Construction failures are the only errors on the audio-facing surface;
/// out-of-range window lengths are clamped instead of rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyDetectError {
    /// Sample rate is outside the supported range
    InvalidSampleRate { sample_rate: u32 },

    /// Window buffers could not be reserved
    BufferAllocationFailed { samples: usize },

    /// Analysis thread could not be spawned
    WorkerSpawnFailed { reason: String },

    /// Parameter key is not recognised
    UnknownParam { key: String },

    /// Parameter value could not be parsed
    InvalidParamValue { key: String, value: String },

    /// Analysis thread panicked
    WorkerPanicked,
}

impl ErrorCode for KeyDetectError {
    fn code(&self) -> i32 {
        match self {
            KeyDetectError::InvalidSampleRate { .. } => DetectorErrorCodes::INVALID_SAMPLE_RATE,
            KeyDetectError::BufferAllocationFailed { .. } => {
                DetectorErrorCodes::BUFFER_ALLOCATION_FAILED
            }
            KeyDetectError::WorkerSpawnFailed { .. } => DetectorErrorCodes::WORKER_SPAWN_FAILED,
            KeyDetectError::UnknownParam { .. } => DetectorErrorCodes::UNKNOWN_PARAM,
            KeyDetectError::InvalidParamValue { .. } => DetectorErrorCodes::INVALID_PARAM_VALUE,
            KeyDetectError::WorkerPanicked => DetectorErrorCodes::WORKER_PANICKED,
        }
    }

    fn message(&self) -> String {
        match self {
            KeyDetectError::InvalidSampleRate { sample_rate } => {
                format!(
                    "Sample rate must be between {} and {} Hz (got {})",
                    crate::config::MIN_SAMPLE_RATE,
                    crate::config::MAX_SAMPLE_RATE,
                    sample_rate
                )
            }
            KeyDetectError::BufferAllocationFailed { samples } => {
                format!("Failed to reserve window buffers of {} samples", samples)
            }
            KeyDetectError::WorkerSpawnFailed { reason } => {
                format!("Failed to start analysis thread: {}", reason)
            }
            KeyDetectError::UnknownParam { key } => format!("Unknown parameter: {}", key),
            KeyDetectError::InvalidParamValue { key, value } => {
                format!("Invalid value for {}: {:?}", key, value)
            }
            KeyDetectError::WorkerPanicked => "Analysis thread panicked".to_string(),
        }
    }
}

impl fmt::Display for KeyDetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyDetectError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for KeyDetectError {}

/// Convert from std::io::Error (thread builder failures)
impl From<std::io::Error> for KeyDetectError {
    fn from(err: std::io::Error) -> Self {
        KeyDetectError::WorkerSpawnFailed {
            reason: err.to_string(),
        }
    }
}
