//! # Live Class Service
//!
//! WebSocket transport for the classroom service contract: the JSON wire
//! protocol, an in-memory reference server and a client implementing
//! [`liveclass_core::ClassroomService`].

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod protocol;
pub mod server;

// Re-export main types
pub use client::WebSocketClassroomService;
pub use protocol::{ServiceRequest, ServiceResponse, UPLOAD_FRAME_SIZE};
pub use server::{ClassroomServer, StoredLesson};

#[cfg(test)]
mod tests {
    use super::*;
    use liveclass_core::{demo_classes, CaptureMode};
    use std::net::{Ipv4Addr, SocketAddr};

    fn test_addr() -> SocketAddr {
        SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0)
    }

    #[test]
    fn test_server_creation() {
        let server = ClassroomServer::new(test_addr(), demo_classes());
        assert!(server.lessons().is_empty());
        assert_eq!(server.join_count("1"), 0);
    }

    #[test]
    fn test_request_serialization() {
        let request = ServiceRequest::JoinClass {
            class_id: "1".to_string(),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("JoinClass"));
        assert!(json.contains("class_id"));

        let deserialized: ServiceRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, request);
    }

    #[test]
    fn test_upload_mode_tag_on_the_wire() {
        let request = ServiceRequest::BeginUpload {
            title: "Fractions".to_string(),
            description: String::new(),
            mode: CaptureMode::Camera,
            mime_type: "video/webm".to_string(),
            size: 42,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"mode\":\"video\""));
        assert!(json.contains("\"size\":42"));
    }

    #[test]
    fn test_class_list_uses_camel_case() {
        let response = ServiceResponse::ClassList {
            classes: demo_classes(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("ClassList"));
        assert!(json.contains("participantCount"));
        assert!(json.contains("recordingUrl"));

        let deserialized: ServiceResponse = serde_json::from_str(&json).unwrap();
        match deserialized {
            ServiceResponse::ClassList { classes } => assert_eq!(classes.len(), 3),
            _ => panic!("Wrong response type"),
        }
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ServiceResponse::Error {
            error: "no upload in progress".to_string(),
            error_code: "NO_UPLOAD".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        let deserialized: ServiceResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, response);
    }
}
