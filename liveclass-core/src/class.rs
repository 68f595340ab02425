//! Class listing model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a class as reported by the classroom service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    /// Class is in progress and can be joined
    Live,
    /// Class has not started yet
    Scheduled,
    /// Class is over; a recording may be available
    Ended,
}

/// Snapshot of a class fetched from the classroom service
///
/// The snapshot is never mutated locally. In particular `participant_count`
/// is display-only and the client does not bump it when joining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSession {
    /// Class identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Instructor display name
    pub instructor: String,
    /// Current status
    pub status: ClassStatus,
    /// Scheduled start
    pub start_time: DateTime<Utc>,
    /// Scheduled end
    pub end_time: DateTime<Utc>,
    /// Number of participants reported by the service
    pub participant_count: u32,
    /// Capacity of the class
    pub max_participants: u32,
    /// Link to the recording of an ended class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
}

impl ClassSession {
    /// Whether the class is currently live
    pub fn is_live(&self) -> bool {
        self.status == ClassStatus::Live
    }

    /// Whether the reported participant count has reached capacity
    pub fn is_full(&self) -> bool {
        self.participant_count >= self.max_participants
    }
}

/// What a recording captures
///
/// The serialized form is the tag the classroom service expects on upload:
/// `video` for camera recordings and `screen` for screen recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Camera and microphone
    #[default]
    #[serde(rename = "video")]
    Camera,
    /// Screen capture with an optional microphone track
    #[serde(rename = "screen")]
    Screen,
}

impl CaptureMode {
    /// Tag sent to the classroom service with an uploaded recording
    pub fn upload_tag(&self) -> &'static str {
        match self {
            CaptureMode::Camera => "video",
            CaptureMode::Screen => "screen",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Camera => write!(f, "camera"),
            CaptureMode::Screen => write!(f, "screen"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn algebra() -> ClassSession {
        let now = Utc::now();
        ClassSession {
            id: "1".to_string(),
            title: "Mathematics - Algebra Basics".to_string(),
            instructor: "Prof. Sharma".to_string(),
            status: ClassStatus::Live,
            start_time: now,
            end_time: now + Duration::hours(1),
            participant_count: 24,
            max_participants: 50,
            recording_url: None,
        }
    }

    #[test]
    fn test_class_session_serialization() {
        let class = algebra();
        let json = serde_json::to_string(&class).unwrap();
        assert!(json.contains("\"participantCount\":24"));
        assert!(json.contains("\"status\":\"live\""));
        assert!(!json.contains("recordingUrl"));

        let deserialized: ClassSession = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, class);
    }

    #[test]
    fn test_capacity() {
        let mut class = algebra();
        assert!(class.is_live());
        assert!(!class.is_full());
        class.participant_count = 50;
        assert!(class.is_full());
    }

    #[test]
    fn test_capture_mode_tags() {
        assert_eq!(CaptureMode::Camera.upload_tag(), "video");
        assert_eq!(CaptureMode::Screen.upload_tag(), "screen");
        assert_eq!(
            serde_json::to_string(&CaptureMode::Screen).unwrap(),
            "\"screen\""
        );
        assert_eq!(CaptureMode::Camera.to_string(), "camera");
    }
}
