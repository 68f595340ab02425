//! In-process capture platform
//!
//! Deterministic stand-in for a real capture stack: devices live in memory,
//! streams are plain track handles and the recorder emits synthetic chunks on
//! a tokio interval. Used by tests and by hosts without capture hardware.

use crate::device::{Device, DeviceKind};
use crate::error::{MediaError, MediaResult, PlaybackError};
use crate::platform::{
    AudioConstraint, DeviceEnumerator, MediaConstraints, MediaPlatform, MediaRecorder,
    RenderSurface, VideoConstraint,
};
use crate::stream::{MediaStream, MediaStreamTrack, TrackKind};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

#[derive(Debug)]
struct PlatformState {
    devices: Vec<Device>,
    hide_labels_until_granted: bool,
    permission_granted: bool,
    deny_camera: bool,
    deny_microphone: bool,
    deny_display: bool,
    user_media_supported: bool,
    display_media_supported: bool,
    fail_enumeration: bool,
    fail_recorder: bool,
    supported_mime_types: Vec<String>,
    emit_empty_chunks: bool,
    chunk_size: usize,
    user_media_requests: Vec<MediaConstraints>,
    display_requests: usize,
    issued: Vec<MediaStream>,
    enumerate_calls: usize,
    recorders_created: usize,
}

/// Capture platform backed by process memory
#[derive(Debug)]
pub struct MockPlatform {
    state: Mutex<PlatformState>,
    device_tx: broadcast::Sender<()>,
}

impl MockPlatform {
    /// One labeled camera, one labeled microphone, everything allowed
    pub fn new() -> Self {
        let (device_tx, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(PlatformState {
                devices: vec![
                    Device::new("cam-1", DeviceKind::Camera, "FaceTime HD Camera"),
                    Device::new("mic-1", DeviceKind::Microphone, "Built-in Microphone"),
                ],
                hide_labels_until_granted: false,
                permission_granted: false,
                deny_camera: false,
                deny_microphone: false,
                deny_display: false,
                user_media_supported: true,
                display_media_supported: true,
                fail_enumeration: false,
                fail_recorder: false,
                supported_mime_types: vec![
                    "video/webm;codecs=vp8,opus".to_string(),
                    "video/webm".to_string(),
                ],
                emit_empty_chunks: false,
                chunk_size: 1024,
                user_media_requests: Vec::new(),
                display_requests: 0,
                issued: Vec::new(),
                enumerate_calls: 0,
                recorders_created: 0,
            }),
            device_tx,
        }
    }

    /// Like [`MockPlatform::new`], but labels stay empty until a capture succeeds
    pub fn with_hidden_labels() -> Self {
        let platform = Self::new();
        platform.state.lock().hide_labels_until_granted = true;
        platform
    }

    /// Replace the device list without notifying watchers
    pub fn set_devices(&self, devices: Vec<Device>) {
        self.state.lock().devices = devices;
    }

    /// Add a device and fire a device-change notification
    pub fn plug_device(&self, device: Device) {
        self.state.lock().devices.push(device);
        let _ = self.device_tx.send(());
    }

    /// Remove a device and fire a device-change notification
    pub fn unplug_device(&self, device_id: &str) {
        self.state.lock().devices.retain(|d| d.id != device_id);
        let _ = self.device_tx.send(());
    }

    /// Refuse camera access
    pub fn set_deny_camera(&self, deny: bool) {
        self.state.lock().deny_camera = deny;
    }

    /// Refuse microphone access
    pub fn set_deny_microphone(&self, deny: bool) {
        self.state.lock().deny_microphone = deny;
    }

    /// Refuse (or cancel) screen capture
    pub fn set_deny_display(&self, deny: bool) {
        self.state.lock().deny_display = deny;
    }

    /// Pretend camera/microphone capture does not exist
    pub fn set_user_media_supported(&self, supported: bool) {
        self.state.lock().user_media_supported = supported;
    }

    /// Pretend screen capture does not exist
    pub fn set_display_media_supported(&self, supported: bool) {
        self.state.lock().display_media_supported = supported;
    }

    /// Make enumeration fail
    pub fn set_fail_enumeration(&self, fail: bool) {
        self.state.lock().fail_enumeration = fail;
    }

    /// Make recorder creation fail
    pub fn set_fail_recorder(&self, fail: bool) {
        self.state.lock().fail_recorder = fail;
    }

    /// Container types the recorder claims to support
    pub fn set_supported_mime_types(&self, mime_types: Vec<String>) {
        self.state.lock().supported_mime_types = mime_types;
    }

    /// Interleave zero-length chunks with real ones
    pub fn set_emit_empty_chunks(&self, emit: bool) {
        self.state.lock().emit_empty_chunks = emit;
    }

    /// Size of every non-empty chunk
    pub fn set_chunk_size(&self, size: usize) {
        self.state.lock().chunk_size = size;
    }

    /// Camera/microphone requests received so far
    pub fn user_media_requests(&self) -> Vec<MediaConstraints> {
        self.state.lock().user_media_requests.clone()
    }

    /// Screen capture requests received so far
    pub fn display_requests(&self) -> usize {
        self.state.lock().display_requests
    }

    /// Every stream handed out, in order
    pub fn issued_streams(&self) -> Vec<MediaStream> {
        self.state.lock().issued.clone()
    }

    /// Number of enumeration calls
    pub fn enumerate_calls(&self) -> usize {
        self.state.lock().enumerate_calls
    }

    /// Number of recorders created
    pub fn recorders_created(&self) -> usize {
        self.state.lock().recorders_created
    }

    fn find_device(state: &PlatformState, kind: DeviceKind, id: Option<&str>) -> MediaResult<Device> {
        let found = state
            .devices
            .iter()
            .find(|d| d.kind == kind && id.map_or(true, |id| d.id == id));
        match found {
            Some(device) => Ok(device.clone()),
            None => Err(MediaError::DeviceNotFound {
                device_id: id.map(str::to_string).unwrap_or_else(|| kind.to_string()),
            }),
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceEnumerator for MockPlatform {
    async fn enumerate_devices(&self) -> MediaResult<Vec<Device>> {
        let mut state = self.state.lock();
        state.enumerate_calls += 1;
        if state.fail_enumeration {
            return Err(MediaError::DeviceEnumerationFailed {
                reason: "mock enumeration failure".to_string(),
            });
        }

        let hide = state.hide_labels_until_granted && !state.permission_granted;
        Ok(state
            .devices
            .iter()
            .map(|d| {
                let mut device = d.clone();
                if hide {
                    device.label.clear();
                }
                device
            })
            .collect())
    }
}

#[async_trait]
impl MediaPlatform for MockPlatform {
    fn supports_user_media(&self) -> bool {
        self.state.lock().user_media_supported
    }

    fn supports_display_media(&self) -> bool {
        self.state.lock().display_media_supported
    }

    async fn get_user_media(&self, constraints: &MediaConstraints) -> MediaResult<MediaStream> {
        let mut state = self.state.lock();
        state.user_media_requests.push(constraints.clone());

        if !state.user_media_supported {
            return Err(MediaError::Unsupported {
                feature: "camera/microphone capture".to_string(),
            });
        }

        let mut tracks = Vec::new();
        if let Some(video) = &constraints.video {
            if state.deny_camera {
                return Err(MediaError::PermissionDenied {
                    operation: "camera".to_string(),
                });
            }
            let id = match video {
                VideoConstraint::Device(id) => Some(id.as_str()),
                _ => None,
            };
            let camera = Self::find_device(&state, DeviceKind::Camera, id)?;
            tracks.push(MediaStreamTrack::new(TrackKind::Video, camera.label));
        }
        if let Some(audio) = &constraints.audio {
            if state.deny_microphone {
                return Err(MediaError::PermissionDenied {
                    operation: "microphone".to_string(),
                });
            }
            let id = match audio {
                AudioConstraint::Device(id) => Some(id.as_str()),
                AudioConstraint::Any => None,
            };
            let microphone = Self::find_device(&state, DeviceKind::Microphone, id)?;
            tracks.push(MediaStreamTrack::new(TrackKind::Audio, microphone.label));
        }

        state.permission_granted = true;
        let stream = MediaStream::new(tracks);
        state.issued.push(stream.clone());
        Ok(stream)
    }

    async fn get_display_media(&self) -> MediaResult<MediaStream> {
        let mut state = self.state.lock();
        state.display_requests += 1;

        if !state.display_media_supported {
            return Err(MediaError::Unsupported {
                feature: "screen capture".to_string(),
            });
        }
        if state.deny_display {
            return Err(MediaError::PermissionDenied {
                operation: "screen capture".to_string(),
            });
        }

        let stream = MediaStream::new(vec![MediaStreamTrack::new(TrackKind::Video, "Screen 1")]);
        state.issued.push(stream.clone());
        Ok(stream)
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.state
            .lock()
            .supported_mime_types
            .iter()
            .any(|m| m == mime_type)
    }

    fn create_recorder(
        &self,
        stream: &MediaStream,
        mime_type: &str,
    ) -> MediaResult<Box<dyn MediaRecorder>> {
        let mut state = self.state.lock();
        if state.fail_recorder {
            return Err(MediaError::Recorder {
                reason: "mock recorder failure".to_string(),
            });
        }
        if !stream.is_active() {
            return Err(MediaError::Recorder {
                reason: "stream has no live tracks".to_string(),
            });
        }
        state.recorders_created += 1;
        Ok(Box::new(MockRecorder::new(
            mime_type,
            state.chunk_size,
            state.emit_empty_chunks,
        )))
    }

    fn device_changes(&self) -> broadcast::Receiver<()> {
        self.device_tx.subscribe()
    }
}

#[derive(Debug, Default)]
struct RecorderShared {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    paused: bool,
    sequence: u64,
}

impl RecorderShared {
    fn emit(&mut self, chunk_size: usize, empty: bool) {
        let Some(tx) = &self.tx else {
            return;
        };
        let chunk = if empty {
            Bytes::new()
        } else {
            Bytes::from(vec![(self.sequence % 251) as u8; chunk_size])
        };
        self.sequence += 1;
        let _ = tx.send(chunk);
    }
}

/// Recorder producing fixed-size synthetic chunks
#[derive(Debug)]
pub struct MockRecorder {
    mime_type: String,
    chunk_size: usize,
    emit_empty_chunks: bool,
    shared: Arc<Mutex<RecorderShared>>,
    task: Option<JoinHandle<()>>,
}

impl MockRecorder {
    fn new(mime_type: &str, chunk_size: usize, emit_empty_chunks: bool) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            chunk_size,
            emit_empty_chunks,
            shared: Arc::new(Mutex::new(RecorderShared::default())),
            task: None,
        }
    }
}

#[async_trait]
impl MediaRecorder for MockRecorder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn start(&mut self, timeslice: Duration) -> MediaResult<mpsc::UnboundedReceiver<Bytes>> {
        if self.task.is_some() {
            return Err(MediaError::invalid_state("recorder already started"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.lock().tx = Some(tx);

        let shared = self.shared.clone();
        let chunk_size = self.chunk_size;
        let emit_empty = self.emit_empty_chunks;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + timeslice, timeslice);
            loop {
                ticker.tick().await;
                let mut shared = shared.lock();
                if shared.paused {
                    continue;
                }
                if emit_empty {
                    shared.emit(0, true);
                }
                shared.emit(chunk_size, false);
            }
        }));
        debug!("Mock recorder started ({:?} timeslice)", timeslice);
        Ok(rx)
    }

    fn pause(&mut self) -> MediaResult<()> {
        let mut shared = self.shared.lock();
        if shared.tx.is_none() {
            return Err(MediaError::invalid_state("recorder not running"));
        }
        shared.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> MediaResult<()> {
        let mut shared = self.shared.lock();
        if shared.tx.is_none() {
            return Err(MediaError::invalid_state("recorder not running"));
        }
        shared.paused = false;
        Ok(())
    }

    async fn stop(&mut self) -> MediaResult<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let mut shared = self.shared.lock();
        if shared.tx.is_none() {
            return Err(MediaError::invalid_state("recorder not running"));
        }
        shared.emit(self.chunk_size, false);
        shared.tx = None;
        Ok(())
    }
}

impl Drop for MockRecorder {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Display surface that records what was shown on it
#[derive(Debug)]
pub struct MockSurface {
    name: String,
    source: Mutex<Option<MediaStream>>,
    recording: Mutex<Option<(Bytes, String)>>,
    muted: AtomicBool,
    playing: AtomicBool,
    auto_metadata: AtomicBool,
    autoplay_blocked: AtomicBool,
    metadata: watch::Sender<bool>,
    play_calls: AtomicUsize,
    mute_history: Mutex<Vec<bool>>,
}

impl MockSurface {
    /// Surface whose metadata is known as soon as a source is set
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let (metadata, _) = watch::channel(false);
        Arc::new(Self {
            name: name.into(),
            source: Mutex::new(None),
            recording: Mutex::new(None),
            muted: AtomicBool::new(true),
            playing: AtomicBool::new(false),
            auto_metadata: AtomicBool::new(true),
            autoplay_blocked: AtomicBool::new(false),
            metadata,
            play_calls: AtomicUsize::new(0),
            mute_history: Mutex::new(Vec::new()),
        })
    }

    /// Surface that only learns metadata through [`MockSurface::fire_metadata`]
    pub fn never_ready(name: impl Into<String>) -> Arc<Self> {
        let surface = Self::new(name);
        surface.auto_metadata.store(false, Ordering::SeqCst);
        surface
    }

    /// Deliver the "metadata ready" signal
    pub fn fire_metadata(&self) {
        self.metadata.send_replace(true);
    }

    /// Reject every `play()` as an autoplay violation
    pub fn set_autoplay_blocked(&self, blocked: bool) {
        self.autoplay_blocked.store(blocked, Ordering::SeqCst);
    }

    /// Stream currently shown
    pub fn source(&self) -> Option<MediaStream> {
        self.source.lock().clone()
    }

    /// Recording currently loaded, with its mime type
    pub fn loaded_recording(&self) -> Option<(Bytes, String)> {
        self.recording.lock().clone()
    }

    /// Whether audio output is muted
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Whether playback is running
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Number of `play()` calls
    pub fn play_calls(&self) -> usize {
        self.play_calls.load(Ordering::SeqCst)
    }

    /// Every value passed to `set_muted`, in order
    pub fn mute_history(&self) -> Vec<bool> {
        self.mute_history.lock().clone()
    }
}

#[async_trait]
impl RenderSurface for MockSurface {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_source(&self, stream: Option<MediaStream>) {
        let ready = stream.is_some() && self.auto_metadata.load(Ordering::SeqCst);
        if stream.is_none() {
            self.playing.store(false, Ordering::SeqCst);
        }
        *self.source.lock() = stream;
        self.metadata.send_replace(ready);
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
        self.mute_history.lock().push(muted);
    }

    fn has_metadata(&self) -> bool {
        *self.metadata.borrow()
    }

    async fn metadata_ready(&self) {
        let mut rx = self.metadata.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    async fn play(&self) -> Result<(), PlaybackError> {
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        if self.autoplay_blocked.load(Ordering::SeqCst) {
            return Err(PlaybackError::AutoplayBlocked);
        }
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn load_recording(&self, data: Bytes, mime_type: &str) {
        *self.source.lock() = None;
        *self.recording.lock() = Some((data, mime_type.to_string()));
        self.metadata.send_replace(true);
    }
}
