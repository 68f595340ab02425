//! Controller error types

use liveclass_core::ServiceError;
use liveclass_media::MediaError;
use thiserror::Error;

/// Error returned by controller operations
#[derive(Error, Debug)]
pub enum LiveClassError {
    /// Capture, device or recording failure
    #[error("Media error: {source}")]
    Media {
        #[from]
        /// Underlying media error
        source: MediaError,
    },

    /// Classroom service failure
    #[error("Service error: {source}")]
    Service {
        #[from]
        /// Underlying service error
        source: ServiceError,
    },

    /// Input rejected before anything was attempted
    #[error("{message}")]
    Validation {
        /// What is wrong with the input
        message: String,
    },

    /// Operation not allowed in the current state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// State error message
        message: String,
    },

    /// The class is not in the loaded class list
    #[error("Class not found: {class_id}")]
    ClassNotFound {
        /// Requested class ID
        class_id: String,
    },

    /// The service refused the join
    #[error("Join rejected for class {class_id}")]
    JoinRejected {
        /// Requested class ID
        class_id: String,
    },

    /// Required builder setting missing
    #[error("Missing required configuration: {field}")]
    MissingConfiguration {
        /// Missing field name
        field: String,
    },

    /// Configuration could not be parsed
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Parse or validation failure
        reason: String,
    },

    /// I/O failure
    #[error("I/O error: {source}")]
    Io {
        #[from]
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Result type alias for controller operations
pub type LiveClassResult<T> = Result<T, LiveClassError>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Capture, device and recording errors
    Media,
    /// Classroom service errors
    Network,
    /// Rejected user input
    Validation,
    /// Operation issued in the wrong state
    State,
    /// Setup errors
    Configuration,
    /// System-level errors (I/O)
    System,
}

impl LiveClassError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        LiveClassError::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        LiveClassError::InvalidState {
            message: message.into(),
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            LiveClassError::Media { .. } => ErrorCategory::Media,
            LiveClassError::Service { .. } => ErrorCategory::Network,
            LiveClassError::ClassNotFound { .. } => ErrorCategory::Network,
            LiveClassError::JoinRejected { .. } => ErrorCategory::Network,
            LiveClassError::Validation { .. } => ErrorCategory::Validation,
            LiveClassError::InvalidState { .. } => ErrorCategory::State,
            LiveClassError::MissingConfiguration { .. } => ErrorCategory::Configuration,
            LiveClassError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            LiveClassError::Io { .. } => ErrorCategory::System,
        }
    }

    /// Whether the error should be shown to the user rather than only logged
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::State | ErrorCategory::Configuration
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveclass_media::TrackKind;

    #[test]
    fn test_error_from_media() {
        let error: LiveClassError = MediaError::NoTrack {
            kind: TrackKind::Audio,
        }
        .into();
        assert_eq!(error.category(), ErrorCategory::Media);
        assert!(error.is_user_visible());
        assert_eq!(error.to_string(), "Media error: No audio track available");
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let error = LiveClassError::validation("Lesson title is required");
        assert_eq!(error.to_string(), "Lesson title is required");
        assert_eq!(error.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_state_errors_are_not_user_visible() {
        assert!(!LiveClassError::invalid_state("not joined").is_user_visible());
        assert!(LiveClassError::JoinRejected {
            class_id: "2".to_string()
        }
        .is_user_visible());
    }
}
