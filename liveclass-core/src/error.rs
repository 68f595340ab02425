//! Error types for classroom service calls

use thiserror::Error;

/// Error returned by a [`crate::ClassroomService`] call
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service could not be reached or the connection broke mid-call
    #[error("Network error: {reason}")]
    Network {
        /// Reason for the network failure
        reason: String,
    },

    /// The service answered with something the client did not expect
    #[error("Protocol error: {message}")]
    Protocol {
        /// Error message
        message: String,
    },

    /// The service processed the request and refused it
    #[error("Server error ({code}): {message}")]
    Server {
        /// Error code for programmatic handling
        code: String,
        /// Human readable message
        message: String,
    },

    /// I/O error while talking to the service
    #[error("I/O error: {source}")]
    Io {
        #[from]
        /// Underlying I/O error
        source: std::io::Error,
    },
}

impl ServiceError {
    /// Shorthand for a network failure
    pub fn network(reason: impl Into<String>) -> Self {
        ServiceError::Network {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Network { .. } => true,
            ServiceError::Io { .. } => true,
            ServiceError::Protocol { .. } => false,
            ServiceError::Server { .. } => false,
        }
    }

    /// Machine readable code, as carried by error responses on the wire
    pub fn error_code(&self) -> String {
        match self {
            ServiceError::Network { .. } => "NETWORK_ERROR".to_string(),
            ServiceError::Protocol { .. } => "PROTOCOL_ERROR".to_string(),
            ServiceError::Server { code, .. } => code.clone(),
            ServiceError::Io { .. } => "IO_ERROR".to_string(),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(error: serde_json::Error) -> Self {
        ServiceError::Protocol {
            message: error.to_string(),
        }
    }
}

/// Result type alias for service calls
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ServiceError::network("connection reset").is_retryable());

        let refused = ServiceError::Server {
            code: "CLASS_NOT_FOUND".to_string(),
            message: "no such class".to_string(),
        };
        assert!(!refused.is_retryable());
        assert_eq!(refused.error_code(), "CLASS_NOT_FOUND");
    }

    #[test]
    fn test_error_display() {
        let error = ServiceError::network("timed out");
        assert_eq!(error.to_string(), "Network error: timed out");
    }

    #[test]
    fn test_error_from_json() {
        let json_error = serde_json::from_str::<u32>("not a number").unwrap_err();
        match ServiceError::from(json_error) {
            ServiceError::Protocol { .. } => (),
            other => panic!("Expected Protocol error variant, got {:?}", other),
        }
    }
}
