// Error types for the key detector
//
// This module defines the detector error type with stable numeric codes so a
// host layer can map failures onto its own plug-in protocol.

mod detector;

pub use detector::{log_detector_error, DetectorErrorCodes, KeyDetectError};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the host boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
