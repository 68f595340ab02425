//! # Live Class Core
//!
//! Shared data model and the contract of the remote classroom service used by
//! the live-class session controller. The classroom service lists classes,
//! confirms joins and accepts recorded lessons; this crate only describes that
//! contract and ships an in-memory implementation of it.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod class;
pub mod error;
pub mod mock;
pub mod service;

// Re-export main types
pub use class::{CaptureMode, ClassSession, ClassStatus};
pub use error::{ServiceError, ServiceResult};
pub use mock::{demo_classes, MockClassroomService};
pub use service::{ClassroomService, RecordingUpload, UploadProgress};
