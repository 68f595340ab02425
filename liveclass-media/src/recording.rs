//! Recording engine
//!
//! State machine driving a platform recorder:
//!
//! ```text
//! idle -> recording <-> paused -> stopped -> idle       (cleared)
//!                                         -> uploading -> idle    (published)
//!                                                      -> stopped (upload failed)
//! ```
//!
//! Camera recordings reuse the session stream when one is lent to the engine;
//! otherwise (and always for screen recordings) the engine captures its own
//! stream and stops it when recording ends. Chunks are collected by a
//! background task, elapsed time by a second one.

use crate::error::{MediaError, MediaResult};
use crate::platform::{MediaConstraints, MediaPlatform, MediaRecorder, RenderSurface};
use crate::stream::{MediaStream, TrackKind};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use liveclass_core::CaptureMode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

/// How long `stop_recording` waits for the final chunk
const COLLECTOR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Recorder settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingConfig {
    /// How often the recorder delivers a chunk
    pub chunk_interval: Duration,
    /// Resolution of the elapsed-time counter
    pub tick_interval: Duration,
    /// Container/codec preferences, best first
    pub preferred_mime_types: Vec<String>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            chunk_interval: Duration::from_millis(100),
            tick_interval: Duration::from_secs(1),
            preferred_mime_types: vec![
                "video/webm;codecs=vp8,opus".to_string(),
                "video/webm".to_string(),
            ],
        }
    }
}

/// Recording engine state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// Nothing recorded
    #[default]
    Idle,
    /// Capturing chunks
    Recording,
    /// Recorder suspended
    Paused,
    /// A finished recording is available
    Stopped,
    /// The finished recording is being uploaded
    Uploading,
}

impl RecordingState {
    /// Whether the recorder is running (recording or paused)
    pub fn is_active(&self) -> bool {
        matches!(self, RecordingState::Recording | RecordingState::Paused)
    }
}

/// Recording engine notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecordingEvent {
    /// Recording started
    Started {
        /// What is being recorded
        mode: CaptureMode,
        /// Container/codec in use
        mime_type: String,
    },
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// One more second recorded
    Tick {
        /// Whole seconds recorded so far
        elapsed_secs: u64,
    },
    /// Recording finished
    Stopped {
        /// Chunks kept
        chunk_count: usize,
        /// Total bytes
        size: usize,
    },
    /// Recording discarded
    Cleared,
    /// A recording could not be started
    Error {
        /// User-facing message
        message: String,
    },
}

/// Who owns the stream being recorded
#[derive(Debug, Clone)]
enum RecordingSource {
    /// Lent by the media session; never stopped here
    Borrowed(MediaStream),
    /// Captured for this recording; stopped when it ends
    Owned(MediaStream),
}

impl RecordingSource {
    fn stream(&self) -> &MediaStream {
        match self {
            RecordingSource::Borrowed(stream) | RecordingSource::Owned(stream) => stream,
        }
    }

    fn release(&self) {
        if let RecordingSource::Owned(stream) = self {
            stream.stop_all();
        }
    }
}

struct ActiveRecording {
    recorder: Box<dyn MediaRecorder>,
    source: RecordingSource,
    collector: JoinHandle<()>,
}

/// The chunks of a finished recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingArtifact {
    /// What was recorded
    pub mode: CaptureMode,
    /// Container/codec of the chunks
    pub mime_type: String,
    /// Non-empty chunks in delivery order
    pub chunks: Vec<Bytes>,
}

impl RecordingArtifact {
    /// Total size in bytes
    pub fn size(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Number of chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no media was captured
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenate the chunks into one blob
    pub fn seal(&self) -> SealedRecording {
        let mut data = BytesMut::with_capacity(self.size());
        for chunk in &self.chunks {
            data.extend_from_slice(chunk);
        }
        SealedRecording {
            mode: self.mode,
            mime_type: self.mime_type.clone(),
            data: data.freeze(),
        }
    }
}

/// A finished recording as a single blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedRecording {
    /// What was recorded
    pub mode: CaptureMode,
    /// Container/codec of `data`
    pub mime_type: String,
    /// The recording
    pub data: Bytes,
}

impl SealedRecording {
    /// File name offered when saving, e.g. `recording-1718000000000.webm`
    pub fn suggested_file_name(&self) -> String {
        format!("recording-{}.webm", Utc::now().timestamp_millis())
    }
}

/// Record, pause, stop and hand over a lesson recording
pub struct RecordingEngine {
    platform: Arc<dyn MediaPlatform>,
    config: RecordingConfig,
    state: RecordingState,
    mode: Option<CaptureMode>,
    mime_type: Option<String>,
    active: Option<ActiveRecording>,
    chunks: Arc<Mutex<Vec<Bytes>>>,
    artifact: Option<RecordingArtifact>,
    elapsed: Arc<AtomicU64>,
    ticker: Option<JoinHandle<()>>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingEngine {
    /// Create an idle engine
    pub fn new(platform: Arc<dyn MediaPlatform>, config: RecordingConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            platform,
            config,
            state: RecordingState::Idle,
            mode: None,
            mime_type: None,
            active: None,
            chunks: Arc::new(Mutex::new(Vec::new())),
            artifact: None,
            elapsed: Arc::new(AtomicU64::new(0)),
            ticker: None,
            event_tx,
        }
    }

    /// Current state
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Mode of the current or last recording
    pub fn mode(&self) -> Option<CaptureMode> {
        self.mode
    }

    /// Container/codec of the current or last recording
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Whether a finished recording is available
    pub fn has_recording(&self) -> bool {
        self.artifact.is_some()
    }

    /// The finished recording, if any
    pub fn artifact(&self) -> Option<&RecordingArtifact> {
        self.artifact.as_ref()
    }

    /// Whole seconds recorded, pauses excluded
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.load(Ordering::SeqCst)
    }

    /// Chunks collected so far by the running recording
    pub fn pending_chunks(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Pick the first supported preference, or the last one when none is
    pub fn select_mime_type(&self) -> String {
        self.config
            .preferred_mime_types
            .iter()
            .find(|m| self.platform.is_type_supported(m))
            .or_else(|| self.config.preferred_mime_types.last())
            .cloned()
            .unwrap_or_else(|| "video/webm".to_string())
    }

    /// Start recording
    ///
    /// In camera mode `borrowed` is the session stream to record; without a
    /// live one a dedicated camera stream is captured. Screen mode always
    /// captures its own stream and adds the microphone when it can. On failure
    /// an [`RecordingEvent::Error`] is emitted and the state is unchanged.
    pub async fn start_recording(
        &mut self,
        mode: CaptureMode,
        borrowed: Option<&MediaStream>,
    ) -> MediaResult<()> {
        if matches!(
            self.state,
            RecordingState::Recording | RecordingState::Paused | RecordingState::Uploading
        ) {
            return Err(MediaError::invalid_state(format!(
                "cannot start recording while {:?}",
                self.state
            )));
        }

        match self.begin(mode, borrowed).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Failed to start {} recording: {}", mode, e);
                let _ = self.event_tx.send(RecordingEvent::Error {
                    message: format!("Failed to start recording: {}", e),
                });
                Err(e)
            }
        }
    }

    async fn begin(&mut self, mode: CaptureMode, borrowed: Option<&MediaStream>) -> MediaResult<()> {
        let source = self.open_source(mode, borrowed).await?;
        let mime_type = self.select_mime_type();

        let mut recorder = match self.platform.create_recorder(source.stream(), &mime_type) {
            Ok(recorder) => recorder,
            Err(e) => {
                source.release();
                return Err(e);
            }
        };
        let mut rx = match recorder.start(self.config.chunk_interval) {
            Ok(rx) => rx,
            Err(e) => {
                source.release();
                return Err(e);
            }
        };

        // a new recording replaces whatever was kept from the previous one
        self.artifact = None;
        let chunks = Arc::new(Mutex::new(Vec::new()));
        self.chunks = chunks.clone();
        let collector = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                if chunk.is_empty() {
                    debug!("Discarding empty chunk");
                    continue;
                }
                chunks.lock().push(chunk);
            }
        });

        self.active = Some(ActiveRecording {
            recorder,
            source,
            collector,
        });
        self.mode = Some(mode);
        self.mime_type = Some(mime_type.clone());
        self.elapsed.store(0, Ordering::SeqCst);
        self.state = RecordingState::Recording;
        self.start_ticker();

        info!("🔴 Recording started ({}, {})", mode, mime_type);
        let _ = self
            .event_tx
            .send(RecordingEvent::Started { mode, mime_type });
        Ok(())
    }

    async fn open_source(
        &self,
        mode: CaptureMode,
        borrowed: Option<&MediaStream>,
    ) -> MediaResult<RecordingSource> {
        match mode {
            CaptureMode::Camera => match borrowed.filter(|s| s.is_active()) {
                Some(stream) => Ok(RecordingSource::Borrowed(stream.clone())),
                None => {
                    debug!("No session stream to borrow, capturing camera for recording");
                    let constraints = MediaConstraints::camera_and_microphone(None, None);
                    let stream = self.platform.get_user_media(&constraints).await?;
                    Ok(RecordingSource::Owned(stream))
                }
            },
            CaptureMode::Screen => {
                if !self.platform.supports_display_media() {
                    return Err(MediaError::Unsupported {
                        feature: "screen capture".to_string(),
                    });
                }
                let mut stream = self.platform.get_display_media().await?;
                match self
                    .platform
                    .get_user_media(&MediaConstraints::audio_only())
                    .await
                {
                    Ok(audio) => {
                        for track in audio.tracks_of(TrackKind::Audio) {
                            stream.add_track(track.clone());
                        }
                    }
                    Err(e) => warn!("Recording screen without microphone: {}", e),
                }
                Ok(RecordingSource::Owned(stream))
            }
        }
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();

        let elapsed = self.elapsed.clone();
        let event_tx = self.event_tx.clone();
        let period = self.config.tick_interval;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let elapsed_secs = elapsed.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = event_tx.send(RecordingEvent::Tick { elapsed_secs });
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    /// Pause a running recording, or resume a paused one
    pub fn pause_recording(&mut self) -> MediaResult<()> {
        match self.state {
            RecordingState::Recording => {
                let active = self
                    .active
                    .as_mut()
                    .ok_or_else(|| MediaError::invalid_state("no active recorder"))?;
                active.recorder.pause()?;
                self.stop_ticker();
                self.state = RecordingState::Paused;
                info!("⏸️ Recording paused at {}s", self.elapsed_secs());
                let _ = self.event_tx.send(RecordingEvent::Paused);
                Ok(())
            }
            RecordingState::Paused => self.resume_recording(),
            state => Err(MediaError::invalid_state(format!(
                "cannot pause while {:?}",
                state
            ))),
        }
    }

    /// Resume a paused recording
    pub fn resume_recording(&mut self) -> MediaResult<()> {
        if self.state != RecordingState::Paused {
            return Err(MediaError::invalid_state(format!(
                "cannot resume while {:?}",
                self.state
            )));
        }
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| MediaError::invalid_state("no active recorder"))?;
        active.recorder.resume()?;
        self.state = RecordingState::Recording;
        self.start_ticker();
        info!("▶️ Recording resumed");
        let _ = self.event_tx.send(RecordingEvent::Resumed);
        Ok(())
    }

    /// Stop recording and keep the result
    pub async fn stop_recording(&mut self) -> MediaResult<()> {
        if !self.state.is_active() {
            return Err(MediaError::invalid_state(format!(
                "cannot stop while {:?}",
                self.state
            )));
        }
        let Some(mut active) = self.active.take() else {
            return Err(MediaError::invalid_state("no active recorder"));
        };

        self.stop_ticker();
        if let Err(e) = active.recorder.stop().await {
            warn!("Recorder did not stop cleanly: {}", e);
        }
        if tokio::time::timeout(COLLECTOR_DRAIN_TIMEOUT, &mut active.collector)
            .await
            .is_err()
        {
            warn!("Final chunk not delivered in time, dropping it");
            active.collector.abort();
        }
        active.source.release();

        let chunks = std::mem::take(&mut *self.chunks.lock());
        let artifact = RecordingArtifact {
            mode: self.mode.unwrap_or_default(),
            mime_type: self
                .mime_type
                .clone()
                .unwrap_or_else(|| active.recorder.mime_type().to_string()),
            chunks,
        };
        let chunk_count = artifact.chunk_count();
        let size = artifact.size();
        self.artifact = Some(artifact);
        self.state = RecordingState::Stopped;

        info!(
            "⏹️ Recording stopped: {} chunk(s), {} bytes, {}",
            chunk_count,
            size,
            format_elapsed(self.elapsed_secs())
        );
        let _ = self
            .event_tx
            .send(RecordingEvent::Stopped { chunk_count, size });
        Ok(())
    }

    /// Discard the finished recording
    pub fn clear(&mut self) -> MediaResult<()> {
        if self.state.is_active() || self.state == RecordingState::Uploading {
            return Err(MediaError::invalid_state(format!(
                "cannot clear while {:?}",
                self.state
            )));
        }
        self.reset();
        info!("Recording cleared");
        let _ = self.event_tx.send(RecordingEvent::Cleared);
        Ok(())
    }

    fn reset(&mut self) {
        self.artifact = None;
        self.chunks.lock().clear();
        self.elapsed.store(0, Ordering::SeqCst);
        self.state = RecordingState::Idle;
    }

    /// Seal the finished recording and mark it as uploading
    pub fn begin_upload(&mut self) -> MediaResult<SealedRecording> {
        if self.state != RecordingState::Stopped {
            return Err(MediaError::invalid_state(format!(
                "cannot upload while {:?}",
                self.state
            )));
        }
        let sealed = self.artifact.as_ref().ok_or(MediaError::NoRecording)?.seal();
        self.state = RecordingState::Uploading;
        Ok(sealed)
    }

    /// Leave the uploading state: discard the recording on success, keep it on failure
    pub fn finish_upload(&mut self, success: bool) {
        if self.state != RecordingState::Uploading {
            warn!("finish_upload called while {:?}", self.state);
            return;
        }
        if success {
            self.reset();
            let _ = self.event_tx.send(RecordingEvent::Cleared);
        } else {
            self.state = RecordingState::Stopped;
        }
    }

    /// Load the finished recording into `surface` and play it
    pub async fn play_back(&self, surface: &dyn RenderSurface) -> MediaResult<()> {
        let sealed = self.artifact.as_ref().ok_or(MediaError::NoRecording)?.seal();
        surface.load_recording(sealed.data, &sealed.mime_type);
        surface.set_muted(false);
        if let Err(e) = surface.play().await {
            warn!("{}: playback refused: {}", surface.name(), e);
        }
        Ok(())
    }

    /// Write the finished recording to `dir` and return the file path
    pub async fn save_recording(&self, dir: &Path) -> MediaResult<PathBuf> {
        let sealed = self.artifact.as_ref().ok_or(MediaError::NoRecording)?.seal();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(sealed.suggested_file_name());
        tokio::fs::write(&path, &sealed.data).await?;
        info!("Saved recording to {}", path.display());
        Ok(path)
    }
}

impl Drop for RecordingEngine {
    fn drop(&mut self) {
        self.stop_ticker();
        if let Some(active) = self.active.take() {
            active.collector.abort();
            active.source.release();
        }
    }
}

/// Format whole seconds as `MM:SS`
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPlatform, MockSurface};

    fn engine() -> (Arc<MockPlatform>, RecordingEngine) {
        let platform = Arc::new(MockPlatform::new());
        let engine = RecordingEngine::new(platform.clone(), RecordingConfig::default());
        (platform, engine)
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(75), "01:15");
        assert_eq!(format_elapsed(3599), "59:59");
    }

    #[test]
    fn test_mime_fallback_to_last_preference() {
        let (platform, engine) = engine();
        assert_eq!(engine.select_mime_type(), "video/webm;codecs=vp8,opus");

        platform.set_supported_mime_types(Vec::new());
        assert_eq!(engine.select_mime_type(), "video/webm");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_keeps_chunks_in_order() {
        let (_platform, mut engine) = engine();
        engine.start_recording(CaptureMode::Camera, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(450)).await;
        engine.stop_recording().await.unwrap();

        let artifact = engine.artifact().unwrap();
        assert_eq!(artifact.chunk_count(), 5);
        let first_bytes: Vec<u8> = artifact.chunks.iter().map(|c| c[0]).collect();
        assert_eq!(first_bytes, vec![0, 1, 2, 3, 4]);
        assert_eq!(engine.state(), RecordingState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_chunks_are_discarded() {
        let (platform, mut engine) = engine();
        platform.set_emit_empty_chunks(true);
        engine.start_recording(CaptureMode::Camera, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        engine.stop_recording().await.unwrap();

        let artifact = engine.artifact().unwrap();
        assert!(artifact.chunks.iter().all(|c| !c.is_empty()));
        assert_eq!(artifact.chunk_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_ticks() {
        let (_platform, mut engine) = engine();
        engine.start_recording(CaptureMode::Camera, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2550)).await;
        assert_eq!(engine.elapsed_secs(), 2);

        engine.pause_recording().unwrap();
        let chunks_at_pause = engine.pending_chunks();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.elapsed_secs(), 2);
        assert_eq!(engine.pending_chunks(), chunks_at_pause);

        engine.pause_recording().unwrap();
        assert_eq!(engine.state(), RecordingState::Recording);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(engine.elapsed_secs(), 3);
    }

    #[tokio::test]
    async fn test_camera_failure_leaves_engine_idle() {
        let (platform, mut engine) = engine();
        platform.set_deny_camera(true);
        let mut events = engine.subscribe();

        let result = engine.start_recording(CaptureMode::Camera, None).await;
        assert!(matches!(result, Err(MediaError::PermissionDenied { .. })));
        assert_eq!(engine.state(), RecordingState::Idle);
        assert!(matches!(events.try_recv(), Ok(RecordingEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_borrowed_stream_survives_stop() {
        let (platform, mut engine) = engine();
        let session_stream = platform
            .get_user_media(&MediaConstraints::camera_and_microphone(None, None))
            .await
            .unwrap();

        engine
            .start_recording(CaptureMode::Camera, Some(&session_stream))
            .await
            .unwrap();
        engine.stop_recording().await.unwrap();
        assert!(session_stream.is_active());
        assert!(engine.has_recording());
    }

    #[tokio::test]
    async fn test_clear_rejected_while_recording() {
        let (_platform, mut engine) = engine();
        engine.start_recording(CaptureMode::Camera, None).await.unwrap();
        assert!(engine.clear().is_err());

        engine.stop_recording().await.unwrap();
        engine.clear().unwrap();
        assert!(!engine.has_recording());
        assert_eq!(engine.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_artifact() {
        let (_platform, mut engine) = engine();
        engine.start_recording(CaptureMode::Camera, None).await.unwrap();
        engine.stop_recording().await.unwrap();

        let sealed = engine.begin_upload().unwrap();
        assert_eq!(engine.state(), RecordingState::Uploading);
        assert!(!sealed.data.is_empty());

        engine.finish_upload(false);
        assert_eq!(engine.state(), RecordingState::Stopped);
        assert!(engine.has_recording());

        engine.begin_upload().unwrap();
        engine.finish_upload(true);
        assert_eq!(engine.state(), RecordingState::Idle);
        assert!(!engine.has_recording());
    }

    #[tokio::test]
    async fn test_play_back_loads_surface() {
        let (_platform, mut engine) = engine();
        let surface = MockSurface::new("playback");
        assert!(matches!(
            engine.play_back(surface.as_ref()).await,
            Err(MediaError::NoRecording)
        ));

        engine.start_recording(CaptureMode::Camera, None).await.unwrap();
        engine.stop_recording().await.unwrap();
        engine.play_back(surface.as_ref()).await.unwrap();

        let (data, mime_type) = surface.loaded_recording().unwrap();
        assert_eq!(data.len(), engine.artifact().unwrap().size());
        assert_eq!(mime_type, "video/webm;codecs=vp8,opus");
        assert!(surface.is_playing());
    }
}
