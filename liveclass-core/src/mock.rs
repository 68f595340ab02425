//! In-memory classroom service
//!
//! Serves a fixed class list, accepts every join and "uploads" recordings by
//! waiting a little while synthesizing progress. Failures can be switched on
//! to exercise the controller's error paths.

use crate::class::{ClassSession, ClassStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::service::{ClassroomService, RecordingUpload, UploadProgress};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Interval between two synthetic progress reports
const PROGRESS_TICK: Duration = Duration::from_millis(200);

/// Largest synthetic progress step, in percent
const MAX_PROGRESS_STEP: f64 = 15.0;

/// Classroom service backed by process memory
#[derive(Debug)]
pub struct MockClassroomService {
    classes: Mutex<Vec<ClassSession>>,
    joined: Mutex<Vec<String>>,
    uploads: Mutex<Vec<RecordingUpload>>,
    list_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    fail_listing: AtomicBool,
    fail_joins: AtomicBool,
    reject_joins: AtomicBool,
    fail_uploads: AtomicBool,
    upload_duration: Mutex<Duration>,
}

impl MockClassroomService {
    /// Create a service with the demo class list
    pub fn new() -> Self {
        Self::with_classes(demo_classes())
    }

    /// Create a service serving the given classes
    pub fn with_classes(classes: Vec<ClassSession>) -> Self {
        Self {
            classes: Mutex::new(classes),
            joined: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            fail_listing: AtomicBool::new(false),
            fail_joins: AtomicBool::new(false),
            reject_joins: AtomicBool::new(false),
            fail_uploads: AtomicBool::new(false),
            upload_duration: Mutex::new(Duration::from_secs(1)),
        }
    }

    /// Replace the served class list
    pub fn set_classes(&self, classes: Vec<ClassSession>) {
        *self.classes.lock() = classes;
    }

    /// Make `list_classes` fail with a network error
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Make `join_class` fail with a network error
    pub fn set_fail_joins(&self, fail: bool) {
        self.fail_joins.store(fail, Ordering::SeqCst);
    }

    /// Make `join_class` answer `false`
    pub fn set_reject_joins(&self, reject: bool) {
        self.reject_joins.store(reject, Ordering::SeqCst);
    }

    /// Make `upload_recording` fail with a network error
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// How long a simulated upload takes
    pub fn set_upload_duration(&self, duration: Duration) {
        *self.upload_duration.lock() = duration;
    }

    /// Class ids for which a join was accepted, in call order
    pub fn joined_classes(&self) -> Vec<String> {
        self.joined.lock().clone()
    }

    /// Recordings received so far
    pub fn uploads(&self) -> Vec<RecordingUpload> {
        self.uploads.lock().clone()
    }

    /// Number of `list_classes` calls, successful or not
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `upload_recording` calls, successful or not
    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockClassroomService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassroomService for MockClassroomService {
    async fn list_classes(&self) -> ServiceResult<Vec<ClassSession>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ServiceError::network("class listing unavailable"));
        }
        Ok(self.classes.lock().clone())
    }

    async fn join_class(&self, class_id: &str) -> ServiceResult<bool> {
        info!("Joining class: {}", class_id);
        if self.fail_joins.load(Ordering::SeqCst) {
            return Err(ServiceError::network("join request failed"));
        }
        if self.reject_joins.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.joined.lock().push(class_id.to_string());
        Ok(true)
    }

    async fn upload_recording(
        &self,
        upload: RecordingUpload,
        progress: UploadProgress,
    ) -> ServiceResult<String> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        info!(
            "Uploading recording: '{}' ({} bytes, {})",
            upload.title,
            upload.size(),
            upload.mode.upload_tag()
        );

        let duration = *self.upload_duration.lock();
        let mut elapsed = Duration::ZERO;
        let mut percent = 0.0f64;
        while elapsed < duration {
            tokio::time::sleep(PROGRESS_TICK).await;
            elapsed += PROGRESS_TICK;
            percent = (percent + rand::thread_rng().gen_range(0.0..MAX_PROGRESS_STEP)).min(100.0);
            progress.report(percent);
            debug!("Synthetic upload progress: {:.0}%", percent);
        }

        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ServiceError::network("upload interrupted"));
        }

        self.uploads.lock().push(upload);
        Ok(format!("lesson-{}", Utc::now().timestamp_millis()))
    }
}

/// The class list shown by the demo portal
pub fn demo_classes() -> Vec<ClassSession> {
    let now = Utc::now();
    vec![
        ClassSession {
            id: "1".to_string(),
            title: "Mathematics - Algebra Basics".to_string(),
            instructor: "Prof. Sharma".to_string(),
            status: ClassStatus::Live,
            start_time: now,
            end_time: now + ChronoDuration::hours(1),
            participant_count: 24,
            max_participants: 50,
            recording_url: None,
        },
        ClassSession {
            id: "2".to_string(),
            title: "Science - Physics Fundamentals".to_string(),
            instructor: "Dr. Patel".to_string(),
            status: ClassStatus::Scheduled,
            start_time: now + ChronoDuration::hours(2),
            end_time: now + ChronoDuration::hours(3),
            participant_count: 0,
            max_participants: 50,
            recording_url: None,
        },
        ClassSession {
            id: "3".to_string(),
            title: "English Literature - Shakespeare".to_string(),
            instructor: "Prof. Johnson".to_string(),
            status: ClassStatus::Ended,
            start_time: now - ChronoDuration::hours(2),
            end_time: now - ChronoDuration::hours(1),
            participant_count: 35,
            max_participants: 50,
            recording_url: Some("https://example.com/recording-123".to_string()),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::CaptureMode;
    use bytes::Bytes;

    fn upload() -> RecordingUpload {
        RecordingUpload {
            title: "Fractions".to_string(),
            description: "Intro".to_string(),
            mode: CaptureMode::Camera,
            mime_type: "video/webm".to_string(),
            data: Bytes::from_static(b"chunk"),
        }
    }

    #[tokio::test]
    async fn test_demo_class_list() {
        let service = MockClassroomService::new();
        let classes = service.list_classes().await.unwrap();
        assert_eq!(classes.len(), 3);
        assert_eq!(classes[0].status, ClassStatus::Live);
        assert!(classes[2].recording_url.is_some());
        assert_eq!(service.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_join_switches() {
        let service = MockClassroomService::new();
        assert!(service.join_class("1").await.unwrap());

        service.set_reject_joins(true);
        assert!(!service.join_class("2").await.unwrap());

        service.set_fail_joins(true);
        assert!(service.join_class("3").await.is_err());
        assert_eq!(service.joined_classes(), vec!["1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_reports_progress() {
        let service = MockClassroomService::new();
        let (progress, rx) = UploadProgress::channel();

        let lesson_id = service.upload_recording(upload(), progress).await.unwrap();
        assert!(lesson_id.starts_with("lesson-"));
        assert!(*rx.borrow() <= 100);
        assert_eq!(service.uploads().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_failure() {
        let service = MockClassroomService::new();
        service.set_fail_uploads(true);
        let (progress, _rx) = UploadProgress::channel();

        let result = service.upload_recording(upload(), progress).await;
        assert!(matches!(result, Err(ServiceError::Network { .. })));
        assert_eq!(service.upload_calls(), 1);
        assert!(service.uploads().is_empty());
    }
}
