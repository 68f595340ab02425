//! Local media session
//!
//! Owns the camera/microphone stream of a joined class and the surfaces it is
//! shown on.

use crate::error::{MediaError, MediaResult};
use crate::platform::{MediaConstraints, MediaPlatform, RenderSurface};
use crate::stream::{MediaStream, TrackKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on the wait for surface metadata
pub const DEFAULT_ATTACH_TIMEOUT: Duration = Duration::from_millis(500);

/// Default length of the microphone self-test
pub const DEFAULT_MIC_TEST_DURATION: Duration = Duration::from_secs(2);

/// Holder of the local capture stream
pub struct MediaSession {
    platform: Arc<dyn MediaPlatform>,
    stream: Option<MediaStream>,
    surfaces: Vec<Arc<dyn RenderSurface>>,
    attach_timeout: Duration,
    mic_test_duration: Duration,
}

impl MediaSession {
    /// Create an empty session
    pub fn new(platform: Arc<dyn MediaPlatform>) -> Self {
        Self {
            platform,
            stream: None,
            surfaces: Vec::new(),
            attach_timeout: DEFAULT_ATTACH_TIMEOUT,
            mic_test_duration: DEFAULT_MIC_TEST_DURATION,
        }
    }

    /// Override the metadata wait bound
    pub fn with_attach_timeout(mut self, timeout: Duration) -> Self {
        self.attach_timeout = timeout;
        self
    }

    /// Override the microphone self-test length
    pub fn with_mic_test_duration(mut self, duration: Duration) -> Self {
        self.mic_test_duration = duration;
        self
    }

    /// Open camera and microphone, replacing any stream already held
    ///
    /// Without explicit device ids the front camera and the default
    /// microphone are used.
    pub async fn acquire(
        &mut self,
        video_device: Option<&str>,
        audio_device: Option<&str>,
    ) -> MediaResult<MediaStream> {
        if !self.platform.supports_user_media() {
            return Err(MediaError::Unsupported {
                feature: "camera/microphone capture".to_string(),
            });
        }

        self.release();

        let constraints = MediaConstraints::camera_and_microphone(video_device, audio_device);
        let stream = self.platform.get_user_media(&constraints).await?;
        info!(
            "Acquired local stream {} ({} track(s))",
            stream.id(),
            stream.tracks().len()
        );
        self.stream = Some(stream.clone());
        Ok(stream)
    }

    /// The stream currently held
    pub fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    /// Whether a live stream is held
    pub fn is_active(&self) -> bool {
        self.stream.as_ref().is_some_and(MediaStream::is_active)
    }

    /// Show the held stream on `surface` and start playback
    ///
    /// Waits for the surface's metadata for at most the attach timeout, then
    /// plays regardless. Playback refusals are logged, never returned.
    pub async fn attach(&mut self, surface: Arc<dyn RenderSurface>, muted: bool) {
        let Some(stream) = self.stream.clone() else {
            debug!("No local stream to attach to {}", surface.name());
            return;
        };

        surface.set_muted(muted);
        surface.set_source(Some(stream));

        if !surface.has_metadata()
            && tokio::time::timeout(self.attach_timeout, surface.metadata_ready())
                .await
                .is_err()
        {
            warn!(
                "{}: no metadata after {:?}, playing anyway",
                surface.name(),
                self.attach_timeout
            );
        }

        if let Err(e) = surface.play().await {
            warn!("{}: playback refused: {}", surface.name(), e);
        }

        let already_attached = self
            .surfaces
            .iter()
            .any(|s| Arc::as_ptr(s) as *const () == Arc::as_ptr(&surface) as *const ());
        if !already_attached {
            self.surfaces.push(surface);
        }
    }

    /// Enable or disable every video track
    pub fn set_video_enabled(&self, enabled: bool) -> MediaResult<()> {
        self.set_kind_enabled(TrackKind::Video, enabled)
    }

    /// Enable or disable every audio track
    pub fn set_audio_enabled(&self, enabled: bool) -> MediaResult<()> {
        self.set_kind_enabled(TrackKind::Audio, enabled)
    }

    fn set_kind_enabled(&self, kind: TrackKind, enabled: bool) -> MediaResult<()> {
        let stream = self.stream.as_ref().ok_or(MediaError::NoTrack { kind })?;
        if !stream.has_kind(kind) {
            return Err(MediaError::NoTrack { kind });
        }
        for track in stream.tracks_of(kind) {
            track.set_enabled(enabled);
        }
        debug!("{} tracks {}", kind, if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Stop every track and detach all surfaces
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop_all();
            info!("Released local stream {}", stream.id());
        }
        for surface in self.surfaces.drain(..) {
            surface.set_source(None);
        }
    }

    /// Play the held stream unmuted on `monitor` for the self-test duration
    pub async fn test_microphone(&self, monitor: &dyn RenderSurface) -> MediaResult<()> {
        let stream = self.stream.as_ref().ok_or(MediaError::NoStream)?;
        if !stream.has_kind(TrackKind::Audio) {
            return Err(MediaError::NoTrack {
                kind: TrackKind::Audio,
            });
        }

        info!("Testing microphone for {:?}", self.mic_test_duration);
        monitor.set_source(Some(stream.clone()));
        monitor.set_muted(false);
        if let Err(e) = monitor.play().await {
            warn!("{}: playback refused: {}", monitor.name(), e);
        }
        tokio::time::sleep(self.mic_test_duration).await;
        monitor.set_muted(true);
        Ok(())
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.release();
    }
}
