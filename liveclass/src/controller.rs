//! Live-class session controller
//!
//! Single owner of one client's class session: the class list, the join/leave
//! lifecycle, local media, the recording and publish workflow, chat, the
//! raised hand and the slide cursor. Operations take `&mut self`; background
//! work lives in the components the controller owns.

use crate::chat::{ChatLog, ChatMessage};
use crate::config::ControllerConfig;
use crate::error::{LiveClassError, LiveClassResult};
use crate::event::{EventStream, LiveClassEvent, EVENT_CHANNEL_CAPACITY};
use crate::publish::PublishWorkflow;
use crate::slides::SlideDeck;
use liveclass_core::{CaptureMode, ClassSession, ClassroomService};
use liveclass_media::{
    format_elapsed, DeviceKind, DeviceList, DeviceRegistry, MediaError, MediaPlatform,
    MediaSession, RecordingEngine, RecordingEvent, RecordingState, RenderSurface, TrackKind,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// Shown when the camera or microphone cannot be opened on join
pub const ACCESS_DENIED: &str = "Camera/Microphone access denied";

/// Shown when the class list cannot be fetched
pub const LOAD_FAILED: &str = "Failed to load classes";

/// Shown when a toggle is used before joining
pub const NO_LOCAL_STREAM: &str = "No local stream available. Join the class first.";

const WELCOME: &str = "Welcome to the live class!";
const WELCOME_TEACHER: &str = "Welcome to the live class (Teacher Mode)!";
const HAND_RAISED: &str = "You raised your hand";

/// How we take part in a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Watches the class
    Student,
    /// Presents and records the class
    Teacher,
}

impl Role {
    /// Name shown next to our own chat messages
    pub fn chat_sender(&self) -> &'static str {
        match self {
            Role::Student => "You",
            Role::Teacher => "Teacher",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Teacher => write!(f, "teacher"),
        }
    }
}

/// Whether we are in a class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JoinState {
    /// Browsing the class list
    #[default]
    NotJoined,
    /// In a class
    Joined {
        /// The class, as listed when it was joined
        class: ClassSession,
        /// Our role in it
        role: Role,
    },
}

/// The session controller
///
/// Build one with [`crate::LiveClassBuilder`].
pub struct LiveClassController {
    config: ControllerConfig,
    service: Arc<dyn ClassroomService>,
    devices: DeviceRegistry,
    media: MediaSession,
    recorder: RecordingEngine,
    publisher: PublishWorkflow,
    local_surface: Option<Arc<dyn RenderSurface>>,
    remote_surface: Option<Arc<dyn RenderSurface>>,
    classes: Vec<ClassSession>,
    loading_tx: watch::Sender<bool>,
    error: Option<String>,
    join_state: JoinState,
    video_enabled: bool,
    audio_enabled: bool,
    hand_raised: bool,
    chat: ChatLog,
    slides: SlideDeck,
    lesson_title: String,
    lesson_description: String,
    event_tx: broadcast::Sender<LiveClassEvent>,
}

impl LiveClassController {
    pub(crate) fn new(
        config: ControllerConfig,
        platform: Arc<dyn MediaPlatform>,
        service: Arc<dyn ClassroomService>,
        devices: DeviceRegistry,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (loading_tx, _) = watch::channel(false);
        let media = MediaSession::new(platform.clone())
            .with_attach_timeout(config.attach_timeout)
            .with_mic_test_duration(config.mic_test_duration);
        let recorder = RecordingEngine::new(platform, config.recording_config());
        let publisher = PublishWorkflow::new(service.clone(), event_tx.clone());
        let slides = SlideDeck::new(config.total_slides);

        Self {
            config,
            service,
            devices,
            media,
            recorder,
            publisher,
            local_surface: None,
            remote_surface: None,
            classes: Vec::new(),
            loading_tx,
            error: None,
            join_state: JoinState::NotJoined,
            video_enabled: true,
            audio_enabled: true,
            hand_raised: false,
            chat: ChatLog::new(),
            slides,
            lesson_title: String::new(),
            lesson_description: String::new(),
            event_tx,
        }
    }

    // ========================================================================
    // Classes and join/leave
    // ========================================================================

    /// Fetch the class list
    ///
    /// On failure the previous list is kept and [`LOAD_FAILED`] becomes the
    /// current error.
    pub async fn load_classes(&mut self) -> LiveClassResult<&[ClassSession]> {
        self.loading_tx.send_replace(true);
        let result = self.service.list_classes().await;
        self.loading_tx.send_replace(false);

        match result {
            Ok(classes) => {
                info!("Loaded {} class(es)", classes.len());
                self.classes = classes;
                self.error = None;
                self.emit(LiveClassEvent::ClassesLoaded {
                    count: self.classes.len(),
                });
                Ok(&self.classes)
            }
            Err(e) => Err(self.report(LOAD_FAILED, e.into())),
        }
    }

    /// Join a class, opening the selected camera and microphone
    ///
    /// Nothing changes when the devices cannot be opened. When the service
    /// refuses the join, or the class is not in the list, the devices are
    /// released again and we stay out of the class.
    pub async fn join(&mut self, class_id: &str, as_teacher: bool) -> LiveClassResult<()> {
        if let JoinState::Joined { class, .. } = &self.join_state {
            return Err(LiveClassError::invalid_state(format!(
                "already in class {}",
                class.id
            )));
        }
        let role = if as_teacher { Role::Teacher } else { Role::Student };
        info!("📚 Joining class {} as {}", class_id, role);

        let camera = self.devices.selected(DeviceKind::Camera);
        let microphone = self.devices.selected(DeviceKind::Microphone);
        if let Err(e) = self
            .media
            .acquire(camera.as_deref(), microphone.as_deref())
            .await
        {
            return Err(self.report(ACCESS_DENIED, e.into()));
        }
        // labels are readable now that capture was granted
        self.devices.list_devices().await;

        if let Some(surface) = self.local_surface.clone() {
            self.media.attach(surface, true).await;
        }
        if role == Role::Teacher {
            if let Some(surface) = self.remote_surface.clone() {
                self.media.attach(surface, true).await;
            }
        }

        match self.service.join_class(class_id).await {
            Ok(true) => {}
            Ok(false) => {
                self.media.release();
                let message = format!("Could not join class {}", class_id);
                let e = LiveClassError::JoinRejected {
                    class_id: class_id.to_string(),
                };
                return Err(self.report(message, e));
            }
            Err(e) => {
                self.media.release();
                let message = format!("Could not join class {}: {}", class_id, e);
                return Err(self.report(message, e.into()));
            }
        }

        if self.classes.is_empty() {
            debug!("Class list not loaded yet, fetching it");
            let _ = self.load_classes().await;
        }
        let Some(class) = self.classes.iter().find(|c| c.id == class_id).cloned() else {
            self.media.release();
            let message = format!("Class {} not found", class_id);
            let e = LiveClassError::ClassNotFound {
                class_id: class_id.to_string(),
            };
            return Err(self.report(message, e));
        };

        self.join_state = JoinState::Joined { class, role };
        self.video_enabled = true;
        self.audio_enabled = true;
        self.hand_raised = false;
        self.error = None;
        self.chat.clear();
        let welcome = match role {
            Role::Teacher => WELCOME_TEACHER,
            Role::Student => WELCOME,
        };
        let message = self.chat.push_system(welcome);

        info!("✅ Joined class {}", class_id);
        self.emit(LiveClassEvent::Joined {
            class_id: class_id.to_string(),
            role,
        });
        self.emit(LiveClassEvent::ChatMessage { message });
        Ok(())
    }

    /// Leave the class
    ///
    /// Stops a running recording (keeping it), releases the devices and
    /// resets the chat, hand, toggles and slide cursor. Leaving when not in a
    /// class only repeats the cleanup.
    pub async fn leave(&mut self) {
        if self.recorder.state().is_active() {
            if let Err(e) = self.recorder.stop_recording().await {
                warn!("Could not stop recording on leave: {}", e);
            }
        }
        self.media.release();
        for surface in [&self.local_surface, &self.remote_surface]
            .into_iter()
            .flatten()
        {
            surface.set_source(None);
        }

        self.chat.clear();
        self.hand_raised = false;
        self.video_enabled = true;
        self.audio_enabled = true;
        self.slides.reset();

        if let JoinState::Joined { class, .. } = std::mem::take(&mut self.join_state) {
            info!("👋 Left class {}", class.id);
            self.emit(LiveClassEvent::Left { class_id: class.id });
        }
    }

    // ========================================================================
    // Media toggles
    // ========================================================================

    /// Switch the camera on or off and return the new state
    pub fn toggle_video(&mut self) -> LiveClassResult<bool> {
        let enabled = !self.video_enabled;
        if let Err(e) = self.media.set_video_enabled(enabled) {
            let message = self.toggle_failure(&e);
            return Err(self.report(message, e.into()));
        }
        self.video_enabled = enabled;
        self.emit(LiveClassEvent::VideoToggled { enabled });
        Ok(enabled)
    }

    /// Switch the microphone on or off and return the new state
    pub fn toggle_audio(&mut self) -> LiveClassResult<bool> {
        let enabled = !self.audio_enabled;
        if let Err(e) = self.media.set_audio_enabled(enabled) {
            let message = self.toggle_failure(&e);
            return Err(self.report(message, e.into()));
        }
        self.audio_enabled = enabled;
        self.emit(LiveClassEvent::AudioToggled { enabled });
        Ok(enabled)
    }

    fn toggle_failure(&self, error: &MediaError) -> String {
        match error {
            _ if self.media.stream().is_none() => NO_LOCAL_STREAM.to_string(),
            MediaError::NoTrack {
                kind: TrackKind::Video,
            } => "No camera track available.".to_string(),
            MediaError::NoTrack {
                kind: TrackKind::Audio,
            } => "No microphone track available.".to_string(),
            other => other.to_string(),
        }
    }

    /// Play our own microphone back on the local surface for a moment
    pub async fn test_microphone(&mut self) -> LiveClassResult<()> {
        let monitor = self
            .local_surface
            .clone()
            .ok_or_else(|| LiveClassError::MissingConfiguration {
                field: "local_surface".to_string(),
            })?;
        if let Err(e) = self.media.test_microphone(monitor.as_ref()).await {
            let message = self.toggle_failure(&e);
            return Err(self.report(message, e.into()));
        }
        Ok(())
    }

    // ========================================================================
    // Hand and chat
    // ========================================================================

    /// Raise or lower the hand and return the new state
    pub fn toggle_hand(&mut self) -> bool {
        self.hand_raised = !self.hand_raised;
        if self.hand_raised {
            let message = self.chat.push_system(HAND_RAISED);
            self.emit(LiveClassEvent::ChatMessage { message });
        }
        self.emit(LiveClassEvent::HandRaised {
            raised: self.hand_raised,
        });
        self.hand_raised
    }

    /// Post a chat message
    ///
    /// Blank text, or text sent outside a class, is ignored.
    pub fn send_chat_message(&mut self, text: &str) -> Option<ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }
        let JoinState::Joined { role, .. } = &self.join_state else {
            debug!("Ignoring chat message outside a class");
            return None;
        };
        let message = self.chat.push(role.chat_sender(), text);
        self.emit(LiveClassEvent::ChatMessage {
            message: message.clone(),
        });
        Some(message)
    }

    // ========================================================================
    // Devices
    // ========================================================================

    /// Enumerate cameras and microphones
    pub async fn list_devices(&self) -> DeviceList {
        self.devices.list_devices().await
    }

    /// Choose the camera or microphone used on the next join
    pub fn select_device(&self, kind: DeviceKind, device_id: impl Into<String>) {
        self.devices.select_device(kind, device_id);
    }

    /// Re-enumerate whenever devices are plugged or unplugged
    pub fn watch_devices(&self) {
        self.devices.watch();
    }

    /// The device registry
    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Start recording the camera or the screen
    ///
    /// Camera recordings reuse the stream opened on join when there is one.
    pub async fn start_recording(&mut self, mode: CaptureMode) -> LiveClassResult<()> {
        let borrowed = match mode {
            CaptureMode::Camera => self.media.stream(),
            CaptureMode::Screen => None,
        };
        if let Err(e) = self.recorder.start_recording(mode, borrowed).await {
            let message = format!("Failed to start recording: {}", e);
            return Err(self.report(message, e.into()));
        }
        Ok(())
    }

    /// Pause a running recording, or resume a paused one
    pub fn pause_recording(&mut self) -> LiveClassResult<()> {
        Ok(self.recorder.pause_recording()?)
    }

    /// Resume a paused recording
    pub fn resume_recording(&mut self) -> LiveClassResult<()> {
        Ok(self.recorder.resume_recording()?)
    }

    /// Stop recording and keep the result
    pub async fn stop_recording(&mut self) -> LiveClassResult<()> {
        Ok(self.recorder.stop_recording().await?)
    }

    /// Discard the finished recording
    pub fn clear_recording(&mut self) -> LiveClassResult<()> {
        Ok(self.recorder.clear()?)
    }

    /// Play the finished recording on `surface`
    pub async fn play_back(&self, surface: &dyn RenderSurface) -> LiveClassResult<()> {
        Ok(self.recorder.play_back(surface).await?)
    }

    /// Write the finished recording into `dir`
    pub async fn save_recording(&self, dir: &Path) -> LiveClassResult<PathBuf> {
        Ok(self.recorder.save_recording(dir).await?)
    }

    /// Recording engine state
    pub fn recording_state(&self) -> RecordingState {
        self.recorder.state()
    }

    /// Whether a finished recording is available
    pub fn has_recording(&self) -> bool {
        self.recorder.has_recording()
    }

    /// Recorded time as `MM:SS`
    pub fn recording_time(&self) -> String {
        format_elapsed(self.recorder.elapsed_secs())
    }

    /// The recording engine
    pub fn recorder(&self) -> &RecordingEngine {
        &self.recorder
    }

    /// Receive recording engine notifications
    pub fn subscribe_recording(&self) -> broadcast::Receiver<RecordingEvent> {
        self.recorder.subscribe()
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    /// Set the title of the lesson to publish
    pub fn set_lesson_title(&mut self, title: impl Into<String>) {
        self.lesson_title = title.into();
    }

    /// Set the description of the lesson to publish
    pub fn set_lesson_description(&mut self, description: impl Into<String>) {
        self.lesson_description = description.into();
    }

    /// Title of the lesson to publish
    pub fn lesson_title(&self) -> &str {
        &self.lesson_title
    }

    /// Description of the lesson to publish
    pub fn lesson_description(&self) -> &str {
        &self.lesson_description
    }

    /// Upload the finished recording as a lesson and return its id
    ///
    /// On success the recording, the lesson draft and the slide cursor are
    /// reset. On failure the recording is kept for another attempt.
    pub async fn publish_lesson(&mut self) -> LiveClassResult<String> {
        let result = self
            .publisher
            .publish(
                &mut self.recorder,
                &self.lesson_title,
                &self.lesson_description,
            )
            .await;

        match result {
            Ok(lesson_id) => {
                self.lesson_title.clear();
                self.lesson_description.clear();
                self.slides.reset();
                self.error = None;
                Ok(lesson_id)
            }
            Err(e) => {
                let message = match &e {
                    LiveClassError::Validation { message } => message.clone(),
                    LiveClassError::Service { source } => format!("Upload failed: {}", source),
                    other => format!("Upload failed: {}", other),
                };
                Err(self.report(message, e))
            }
        }
    }

    /// Progress of the current or last upload, in percent
    pub fn upload_progress(&self) -> u8 {
        self.publisher.progress()
    }

    /// Receive every upload progress change
    pub fn subscribe_upload_progress(&self) -> watch::Receiver<u8> {
        self.publisher.subscribe_progress()
    }

    // ========================================================================
    // Slides
    // ========================================================================

    /// Advance one slide
    pub fn next_slide(&mut self) -> u32 {
        self.slides.next()
    }

    /// Go back one slide
    pub fn previous_slide(&mut self) -> u32 {
        self.slides.previous()
    }

    /// Slide cursor
    pub fn slides(&self) -> SlideDeck {
        self.slides
    }

    // ========================================================================
    // Surfaces and state
    // ========================================================================

    /// Surface showing our own camera
    pub fn set_local_surface(&mut self, surface: Arc<dyn RenderSurface>) {
        self.local_surface = Some(surface);
    }

    /// Surface for the other side; mirrors our camera while teaching
    pub fn set_remote_surface(&mut self, surface: Arc<dyn RenderSurface>) {
        self.remote_surface = Some(surface);
    }

    /// Classes from the last successful load
    pub fn classes(&self) -> &[ClassSession] {
        &self.classes
    }

    /// Whether a class list request is in flight
    pub fn is_loading(&self) -> bool {
        *self.loading_tx.borrow()
    }

    /// Receive loading flag changes
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading_tx.subscribe()
    }

    /// Join state
    pub fn join_state(&self) -> &JoinState {
        &self.join_state
    }

    /// Whether we are in a class
    pub fn is_joined(&self) -> bool {
        matches!(self.join_state, JoinState::Joined { .. })
    }

    /// The class we are in
    pub fn current_class(&self) -> Option<&ClassSession> {
        match &self.join_state {
            JoinState::Joined { class, .. } => Some(class),
            JoinState::NotJoined => None,
        }
    }

    /// Our role in the current class
    pub fn role(&self) -> Option<Role> {
        match &self.join_state {
            JoinState::Joined { role, .. } => Some(*role),
            JoinState::NotJoined => None,
        }
    }

    /// Last user-facing error
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Dismiss the current error
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Whether the camera is on
    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    /// Whether the microphone is on
    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    /// Whether the hand is raised
    pub fn hand_raised(&self) -> bool {
        self.hand_raised
    }

    /// Chat messages in the order they were added
    pub fn chat_messages(&self) -> &[ChatMessage] {
        self.chat.messages()
    }

    /// The local media session
    pub fn media(&self) -> &MediaSession {
        &self.media
    }

    /// Configuration the controller was built with
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The classroom service in use
    pub fn service(&self) -> &Arc<dyn ClassroomService> {
        &self.service
    }

    /// Subscribe to controller events
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_tx.subscribe())
    }

    fn emit(&self, event: LiveClassEvent) {
        let _ = self.event_tx.send(event);
    }

    fn report(&mut self, message: impl Into<String>, e: LiveClassError) -> LiveClassError {
        let message = message.into();
        error!("{} ({})", message, e);
        self.error = Some(message.clone());
        self.emit(LiveClassEvent::Error { message });
        e
    }
}

impl std::fmt::Debug for LiveClassController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveClassController")
            .field("join_state", &self.join_state)
            .field("recording", &self.recorder.state())
            .field("classes", &self.classes.len())
            .field("error", &self.error)
            .finish()
    }
}
