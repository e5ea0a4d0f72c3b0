//! Capture error types and handling
//!
//! This module defines all error types used throughout the capture library,
//! providing clear error messages and context for debugging and recovery
//! decisions.

use thiserror::Error;

/// Main error type for capture operations
#[derive(Error, Debug)]
pub enum CaptureError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// No device matched the requested token
    #[error("device '{token}' was not found{}", detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    DeviceNotFound {
        /// Token the user asked for (index or name substring)
        token: String,
        /// Enumeration error observed while searching, if any
        detail: Option<String>,
    },

    /// Device enumeration is required on this platform but unavailable
    #[error("device enumeration unavailable: {reason}")]
    EnumerationUnavailable {
        /// Why the platform enumeration API could not be used
        reason: String,
    },

    /// Malformed pixel-encoding token
    #[error("invalid pixel format '{token}': {reason}")]
    InvalidFormatSpec {
        /// Offending token
        token: String,
        /// What was wrong with it
        reason: String,
    },

    /// A non-format option carried a value the library cannot use
    #[error("invalid configuration '{token}': {reason}")]
    InvalidConfiguration {
        /// Offending token
        token: String,
        /// What was wrong with it
        reason: String,
    },

    /// Every backend/format candidate was exhausted without a live stream
    #[error("failed to open capture device '{device}' with any backend")]
    OpenFailed {
        /// Device the engine tried to open
        device: String,
    },

    /// A bounded frame pull elapsed without delivering a frame
    ///
    /// Per-candidate condition; the acquisition engine recovers from it by
    /// moving to the next candidate and never surfaces it to callers.
    #[error("no frame arrived within {wait:?}")]
    ProbeTimedOut {
        /// The bounded wait that elapsed
        wait: std::time::Duration,
    },

    /// A native capture API reported an error while opening or configuring
    #[error("capture backend error: {message}")]
    Backend {
        /// Error text reported by the native API
        message: String,
    },

    /// Sustained read failures with no reconnect attempts permitted
    #[error("camera signal lost after {failures} consecutive failed reads")]
    StreamLost {
        /// Consecutive failed reads observed when the stream gave up
        failures: u32,
    },

    /// A reconnect attempt could not re-acquire the device
    #[error("unable to recover the camera stream after {reconnects} reconnect(s)")]
    ReconnectExhausted {
        /// Reconnects performed before giving up
        reconnects: u32,
    },
}

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

impl CaptureError {
    /// Check if error is recoverable by trying another candidate or retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            CaptureError::Io { .. } => true,
            CaptureError::ProbeTimedOut { .. } => true,
            CaptureError::Backend { .. } => true,
            CaptureError::DeviceNotFound { .. } => false,
            CaptureError::EnumerationUnavailable { .. } => false,
            CaptureError::InvalidFormatSpec { .. } => false,
            CaptureError::InvalidConfiguration { .. } => false,
            CaptureError::OpenFailed { .. } => false,
            CaptureError::StreamLost { .. } => false,
            CaptureError::ReconnectExhausted { .. } => false,
        }
    }
}
