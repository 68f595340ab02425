//! Platform capture layer
//!
//! Everything the controller needs from the host: device enumeration, camera
//! and screen capture, a chunked recorder and display surfaces. Backends
//! implement these traits; [`crate::mock`] provides an in-process one.

use crate::device::Device;
use crate::error::{MediaResult, PlaybackError};
use crate::stream::MediaStream;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Source of the capture device list
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    /// List all camera and microphone inputs
    async fn enumerate_devices(&self) -> MediaResult<Vec<Device>>;
}

/// Which camera to open when no device is named
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Front camera
    User,
    /// Rear camera
    Environment,
}

/// Video part of a capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoConstraint {
    /// A specific camera
    Device(String),
    /// Any camera facing this way
    FacingMode(FacingMode),
    /// Whatever the platform picks
    Any,
}

/// Audio part of a capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioConstraint {
    /// A specific microphone
    Device(String),
    /// The default microphone
    Any,
}

/// A camera/microphone capture request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaConstraints {
    /// Requested video, if any
    pub video: Option<VideoConstraint>,
    /// Requested audio, if any
    pub audio: Option<AudioConstraint>,
}

impl MediaConstraints {
    /// Camera and microphone, honoring explicit device choices
    ///
    /// Without a camera choice the front-facing camera is requested; without a
    /// microphone choice the default microphone is used.
    pub fn camera_and_microphone(video_device: Option<&str>, audio_device: Option<&str>) -> Self {
        Self {
            video: Some(match video_device {
                Some(id) => VideoConstraint::Device(id.to_string()),
                None => VideoConstraint::FacingMode(FacingMode::User),
            }),
            audio: Some(match audio_device {
                Some(id) => AudioConstraint::Device(id.to_string()),
                None => AudioConstraint::Any,
            }),
        }
    }

    /// Minimal audio+video request, used to unlock device labels
    pub fn any_audio_video() -> Self {
        Self {
            video: Some(VideoConstraint::Any),
            audio: Some(AudioConstraint::Any),
        }
    }

    /// Default microphone only
    pub fn audio_only() -> Self {
        Self {
            video: None,
            audio: Some(AudioConstraint::Any),
        }
    }
}

/// Host capture capabilities
#[async_trait]
pub trait MediaPlatform: DeviceEnumerator {
    /// Whether camera/microphone capture exists at all
    fn supports_user_media(&self) -> bool;

    /// Whether screen capture exists at all
    fn supports_display_media(&self) -> bool;

    /// Open camera and/or microphone
    async fn get_user_media(&self, constraints: &MediaConstraints) -> MediaResult<MediaStream>;

    /// Ask the user to pick a screen, window or tab to capture
    async fn get_display_media(&self) -> MediaResult<MediaStream>;

    /// Whether the recorder can produce this container/codec
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Create a recorder for `stream`
    fn create_recorder(
        &self,
        stream: &MediaStream,
        mime_type: &str,
    ) -> MediaResult<Box<dyn MediaRecorder>>;

    /// Notifications fired whenever devices are plugged or unplugged
    fn device_changes(&self) -> broadcast::Receiver<()>;
}

/// Chunked recorder bound to one stream
#[async_trait]
pub trait MediaRecorder: Send + Sync {
    /// Container/codec being produced
    fn mime_type(&self) -> &str;

    /// Start recording, delivering a chunk every `timeslice`
    ///
    /// Chunks arrive in recording order. The channel closes after the final
    /// chunk has been delivered by [`MediaRecorder::stop`].
    fn start(&mut self, timeslice: Duration) -> MediaResult<mpsc::UnboundedReceiver<Bytes>>;

    /// Suspend chunk production
    fn pause(&mut self) -> MediaResult<()>;

    /// Resume chunk production
    fn resume(&mut self) -> MediaResult<()>;

    /// Flush the final chunk and close the chunk channel
    async fn stop(&mut self) -> MediaResult<()>;
}

/// A display target such as a local preview, a remote tile or a playback view
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Show a live stream, or nothing
    fn set_source(&self, stream: Option<MediaStream>);

    /// Mute or unmute audio output
    fn set_muted(&self, muted: bool);

    /// Whether dimensions/duration of the current source are known
    fn has_metadata(&self) -> bool;

    /// Resolve once metadata of the current source is known
    async fn metadata_ready(&self);

    /// Start playback
    async fn play(&self) -> Result<(), PlaybackError>;

    /// Pause playback
    fn pause(&self);

    /// Show a finished recording instead of a live stream
    fn load_recording(&self, data: Bytes, mime_type: &str);
}
