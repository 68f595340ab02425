//! Classroom service contract
//!
//! The classroom service is an external collaborator. The controller only
//! relies on the three calls of [`ClassroomService`]; how they travel (an
//! in-memory mock, a WebSocket connection, ...) is up to the implementation.

use crate::class::{CaptureMode, ClassSession};
use crate::error::ServiceResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::watch;

/// A sealed recording plus the lesson metadata entered by the teacher
#[derive(Debug, Clone)]
pub struct RecordingUpload {
    /// Lesson title, never blank
    pub title: String,
    /// Free-form lesson description
    pub description: String,
    /// What the recording captured
    pub mode: CaptureMode,
    /// Container/codec of `data`
    pub mime_type: String,
    /// The recording as one blob
    pub data: Bytes,
}

impl RecordingUpload {
    /// Size of the recording in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Remote classroom service
#[async_trait]
pub trait ClassroomService: Send + Sync {
    /// List the classes visible to this user
    async fn list_classes(&self) -> ServiceResult<Vec<ClassSession>>;

    /// Tell the service we are joining a class; `false` means the join was refused
    async fn join_class(&self, class_id: &str) -> ServiceResult<bool>;

    /// Upload a recorded lesson and return the new lesson identifier
    ///
    /// Implementations report how far along the upload is through `progress`.
    async fn upload_recording(
        &self,
        upload: RecordingUpload,
        progress: UploadProgress,
    ) -> ServiceResult<String>;
}

/// Upload progress reporter
///
/// Progress is a percentage in `[0, 100]` that never goes down: reports below
/// the current value are ignored and reports above 100 are clamped. Clones
/// share the same channel.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    tx: Arc<watch::Sender<u8>>,
}

impl UploadProgress {
    /// Create a reporter starting at 0 together with a receiver for it
    pub fn channel() -> (Self, watch::Receiver<u8>) {
        let (tx, rx) = watch::channel(0u8);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Report a percentage
    pub fn report(&self, percent: f64) {
        if !percent.is_finite() {
            return;
        }
        let value = percent.clamp(0.0, 100.0).floor() as u8;
        self.tx.send_if_modified(|current| {
            if value > *current {
                *current = value;
                true
            } else {
                false
            }
        });
    }

    /// Report progress as bytes sent out of a total
    pub fn report_bytes(&self, sent: u64, total: u64) {
        if total == 0 {
            return;
        }
        self.report(sent as f64 * 100.0 / total as f64);
    }

    /// Mark the upload as finished
    pub fn complete(&self) {
        self.report(100.0);
    }

    /// Current percentage
    pub fn current(&self) -> u8 {
        *self.tx.borrow()
    }

    /// Subscribe to progress changes
    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic() {
        let (progress, rx) = UploadProgress::channel();
        progress.report(12.7);
        assert_eq!(progress.current(), 12);
        progress.report(5.0);
        assert_eq!(progress.current(), 12);
        progress.report(40.0);
        assert_eq!(*rx.borrow(), 40);
    }

    #[test]
    fn test_progress_is_clamped() {
        let (progress, _rx) = UploadProgress::channel();
        progress.report(250.0);
        assert_eq!(progress.current(), 100);
        progress.report(f64::NAN);
        assert_eq!(progress.current(), 100);

        let (progress, _rx) = UploadProgress::channel();
        progress.report(-3.0);
        assert_eq!(progress.current(), 0);
    }

    #[test]
    fn test_progress_from_bytes() {
        let (progress, _rx) = UploadProgress::channel();
        progress.report_bytes(0, 0);
        assert_eq!(progress.current(), 0);
        progress.report_bytes(512, 1024);
        assert_eq!(progress.current(), 50);
        progress.complete();
        assert_eq!(progress.current(), 100);
    }

    #[test]
    fn test_progress_clones_share_state() {
        let (progress, _rx) = UploadProgress::channel();
        let clone = progress.clone();
        clone.report(30.0);
        assert_eq!(progress.current(), 30);
    }
}
