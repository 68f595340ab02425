//! Media error types and handling
//!
//! Errors raised while enumerating devices, acquiring capture streams,
//! toggling tracks and recording.

use crate::stream::TrackKind;
use thiserror::Error;

/// Main error type for media operations
#[derive(Error, Debug)]
pub enum MediaError {
    /// The user or the platform refused access to a capture device
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// Operation that was denied
        operation: String,
    },

    /// No hardware matches the request
    #[error("Device not found: {device_id}")]
    DeviceNotFound {
        /// Device identifier, or the kind of device when none was named
        device_id: String,
    },

    /// The platform has no such capability
    #[error("Unsupported: {feature}")]
    Unsupported {
        /// Missing capability
        feature: String,
    },

    /// The session holds no track of the requested kind
    #[error("No {kind} track available")]
    NoTrack {
        /// Kind of track that was requested
        kind: TrackKind,
    },

    /// No stream has been acquired
    #[error("No local stream available")]
    NoStream,

    /// No finalized recording is available
    #[error("No recording available")]
    NoRecording,

    /// Device enumeration failed
    #[error("Device enumeration failed: {reason}")]
    DeviceEnumerationFailed {
        /// Failure reason
        reason: String,
    },

    /// Operation not allowed in the current state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// State error message
        message: String,
    },

    /// The platform recorder failed
    #[error("Recorder error: {reason}")]
    Recorder {
        /// Failure reason
        reason: String,
    },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Check if retrying the operation may succeed without user action
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::Io { .. } => true,
            MediaError::Recorder { .. } => true,
            MediaError::DeviceEnumerationFailed { .. } => true,
            MediaError::PermissionDenied { .. } => false,
            MediaError::DeviceNotFound { .. } => false,
            MediaError::Unsupported { .. } => false,
            _ => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::PermissionDenied { .. } => ErrorCategory::Permission,
            MediaError::DeviceNotFound { .. } => ErrorCategory::Device,
            MediaError::DeviceEnumerationFailed { .. } => ErrorCategory::Device,
            MediaError::Unsupported { .. } => ErrorCategory::Platform,
            MediaError::NoTrack { .. } => ErrorCategory::State,
            MediaError::NoStream => ErrorCategory::State,
            MediaError::NoRecording => ErrorCategory::State,
            MediaError::InvalidState { .. } => ErrorCategory::State,
            MediaError::Recorder { .. } => ErrorCategory::Recorder,
            MediaError::Io { .. } => ErrorCategory::System,
        }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        MediaError::InvalidState {
            message: message.into(),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Capture permission errors
    Permission,
    /// Device and hardware errors
    Device,
    /// Missing platform capabilities
    Platform,
    /// State management errors
    State,
    /// Recorder failures
    Recorder,
    /// System-level errors (I/O)
    System,
}

/// Why a surface refused to start playback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Autoplay policy requires a user gesture first
    #[error("playback blocked by autoplay policy")]
    AutoplayBlocked,

    /// Any other playback failure
    #[error("playback failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let denied = MediaError::PermissionDenied {
            operation: "camera".to_string(),
        };
        assert_eq!(denied.category(), ErrorCategory::Permission);
        assert!(!denied.is_recoverable());

        let no_track = MediaError::NoTrack {
            kind: TrackKind::Audio,
        };
        assert_eq!(no_track.category(), ErrorCategory::State);
    }

    #[test]
    fn test_error_display() {
        let error = MediaError::NoTrack {
            kind: TrackKind::Video,
        };
        assert_eq!(error.to_string(), "No video track available");
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let media_error = MediaError::from(io_error);

        match media_error {
            MediaError::Io { .. } => (),
            _ => panic!("Expected Io error variant"),
        }
    }
}
