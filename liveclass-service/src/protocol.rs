//! Classroom service wire protocol
//!
//! Requests and responses travel as JSON text frames. Recording bytes travel
//! as binary frames of at most [`UPLOAD_FRAME_SIZE`] bytes, sent between
//! [`ServiceRequest::BeginUpload`] and [`ServiceRequest::EndUpload`].

use liveclass_core::{CaptureMode, ClassSession};
use serde::{Deserialize, Serialize};

/// Largest binary frame used for recording bytes
pub const UPLOAD_FRAME_SIZE: usize = 64 * 1024;

/// Client requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServiceRequest {
    /// List the classes visible to this user
    ListClasses,
    /// Announce that the user is joining a class
    JoinClass {
        /// Class ID
        class_id: String,
    },
    /// Announce a recording upload; binary frames follow
    BeginUpload {
        /// Lesson title
        title: String,
        /// Lesson description
        description: String,
        /// What the recording captured
        mode: CaptureMode,
        /// Container/codec of the recording
        mime_type: String,
        /// Total number of bytes that will follow
        size: u64,
    },
    /// All binary frames of the current upload have been sent
    EndUpload,
}

/// Server responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServiceResponse {
    /// Answer to [`ServiceRequest::ListClasses`]
    ClassList {
        /// Visible classes
        classes: Vec<ClassSession>,
    },
    /// Answer to [`ServiceRequest::JoinClass`]
    JoinResult {
        /// Class ID from the request
        class_id: String,
        /// Whether the join was accepted
        accepted: bool,
    },
    /// The server is ready to receive recording bytes
    UploadReady {
        /// Server-side upload ID
        upload_id: String,
    },
    /// The recording was stored
    Uploaded {
        /// ID of the new lesson
        lesson_id: String,
    },
    /// Error response
    Error {
        /// Error message
        error: String,
        /// Error code for programmatic handling
        error_code: String,
    },
}
