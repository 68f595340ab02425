//! Publish workflow
//!
//! Uploads a finished recording as a lesson. The title and the recording are
//! checked before the service is contacted; progress reported by the service
//! is clamped and made monotonic before it reaches subscribers.

use crate::error::{LiveClassError, LiveClassResult};
use crate::event::LiveClassEvent;
use liveclass_core::{ClassroomService, RecordingUpload, UploadProgress};
use liveclass_media::RecordingEngine;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};

/// Validation message for a blank lesson title
pub const TITLE_REQUIRED: &str = "Lesson title is required";

/// Validation message when nothing has been recorded
pub const NO_RECORDING: &str = "No recording available to upload";

/// Validation message for a recording without data
pub const EMPTY_RECORDING: &str = "Recording is empty";

/// Uploads finished recordings to the classroom service
pub struct PublishWorkflow {
    service: Arc<dyn ClassroomService>,
    progress_tx: watch::Sender<u8>,
    event_tx: broadcast::Sender<LiveClassEvent>,
}

impl PublishWorkflow {
    /// Create a workflow that announces progress and results on `event_tx`
    pub fn new(
        service: Arc<dyn ClassroomService>,
        event_tx: broadcast::Sender<LiveClassEvent>,
    ) -> Self {
        let (progress_tx, _) = watch::channel(0u8);
        Self {
            service,
            progress_tx,
            event_tx,
        }
    }

    /// Progress of the current or last upload, in percent
    pub fn progress(&self) -> u8 {
        *self.progress_tx.borrow()
    }

    /// Receive every progress change
    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress_tx.subscribe()
    }

    /// Upload the recording held by `engine` and return the lesson id
    ///
    /// On success the engine is reset to idle. On failure the engine goes
    /// back to stopped and keeps the recording, so the upload can be retried.
    pub async fn publish(
        &self,
        engine: &mut RecordingEngine,
        title: &str,
        description: &str,
    ) -> LiveClassResult<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LiveClassError::validation(TITLE_REQUIRED));
        }
        match engine.artifact() {
            None => return Err(LiveClassError::validation(NO_RECORDING)),
            Some(artifact) if artifact.is_empty() => {
                return Err(LiveClassError::validation(EMPTY_RECORDING))
            }
            Some(_) => {}
        }

        let sealed = engine.begin_upload()?;
        self.progress_tx.send_replace(0);

        let upload = RecordingUpload {
            title: title.to_string(),
            description: description.to_string(),
            mode: sealed.mode,
            mime_type: sealed.mime_type,
            data: sealed.data,
        };
        info!(
            "📤 Publishing '{}' ({} bytes, {})",
            upload.title,
            upload.size(),
            upload.mode.upload_tag()
        );

        let (reporter, mut progress_rx) = UploadProgress::channel();
        let upload_call = self.service.upload_recording(upload, reporter);
        tokio::pin!(upload_call);

        let mut progress_open = true;
        let result = loop {
            tokio::select! {
                result = &mut upload_call => break result,
                changed = progress_rx.changed(), if progress_open => match changed {
                    Ok(()) => {
                        let percent = *progress_rx.borrow_and_update();
                        self.advance(percent);
                    }
                    Err(_) => progress_open = false,
                },
            }
        };
        self.advance(*progress_rx.borrow());

        match result {
            Ok(lesson_id) => {
                self.advance(100);
                engine.finish_upload(true);
                info!("✅ Lesson published: {}", lesson_id);
                let _ = self.event_tx.send(LiveClassEvent::Published {
                    lesson_id: lesson_id.clone(),
                });
                Ok(lesson_id)
            }
            Err(e) => {
                engine.finish_upload(false);
                error!("Upload failed: {}", e);
                Err(e.into())
            }
        }
    }

    fn advance(&self, percent: u8) {
        let percent = percent.min(100);
        let changed = self.progress_tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
        if changed {
            debug!("Upload progress: {}%", percent);
            let _ = self
                .event_tx
                .send(LiveClassEvent::UploadProgress { percent });
        }
    }
}

impl std::fmt::Debug for PublishWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishWorkflow")
            .field("progress", &self.progress())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EVENT_CHANNEL_CAPACITY;
    use liveclass_core::{CaptureMode, MockClassroomService};
    use liveclass_media::{MockPlatform, RecordingConfig, RecordingState};
    use std::time::Duration;

    fn workflow(service: Arc<MockClassroomService>) -> (PublishWorkflow, broadcast::Receiver<LiveClassEvent>) {
        let (tx, rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        (PublishWorkflow::new(service, tx), rx)
    }

    async fn recorded_engine() -> RecordingEngine {
        let platform = Arc::new(MockPlatform::new());
        let mut engine = RecordingEngine::new(platform, RecordingConfig::default());
        engine
            .start_recording(CaptureMode::Camera, None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        engine.stop_recording().await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_blank_title_never_uploads() {
        let service = Arc::new(MockClassroomService::new());
        let (workflow, _rx) = workflow(service.clone());
        let platform = Arc::new(MockPlatform::new());
        let mut engine = RecordingEngine::new(platform, RecordingConfig::default());

        let result = workflow.publish(&mut engine, "   ", "").await;
        assert!(
            matches!(result, Err(LiveClassError::Validation { ref message }) if message == TITLE_REQUIRED)
        );
        let result = workflow.publish(&mut engine, "Lesson", "").await;
        assert!(
            matches!(result, Err(LiveClassError::Validation { ref message }) if message == NO_RECORDING)
        );
        assert_eq!(service.upload_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_success_resets_engine() {
        let service = Arc::new(MockClassroomService::new());
        let (workflow, mut rx) = workflow(service.clone());
        let mut engine = recorded_engine().await;

        let lesson_id = workflow
            .publish(&mut engine, "  Fractions  ", "intro")
            .await
            .unwrap();

        assert!(lesson_id.starts_with("lesson-"));
        assert_eq!(workflow.progress(), 100);
        assert_eq!(engine.state(), RecordingState::Idle);
        assert!(!engine.has_recording());

        let uploads = service.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].title, "Fractions");
        assert_eq!(uploads[0].mode, CaptureMode::Camera);

        let mut last = 0;
        while let Ok(event) = rx.try_recv() {
            if let LiveClassEvent::UploadProgress { percent } = event {
                assert!(percent >= last);
                last = percent;
            }
        }
        assert_eq!(last, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_keeps_recording() {
        let service = Arc::new(MockClassroomService::new());
        service.set_fail_uploads(true);
        let (workflow, _rx) = workflow(service.clone());
        let mut engine = recorded_engine().await;
        let size = engine.artifact().map(|a| a.size());

        let result = workflow.publish(&mut engine, "Fractions", "").await;
        assert!(matches!(result, Err(LiveClassError::Service { .. })));
        assert_eq!(engine.state(), RecordingState::Stopped);
        assert_eq!(engine.artifact().map(|a| a.size()), size);

        service.set_fail_uploads(false);
        assert!(workflow.publish(&mut engine, "Fractions", "").await.is_ok());
    }
}
