//! # Live Class
//!
//! Client-side controller for a live-class portal. It opens the camera and
//! microphone when a class is joined, records the camera or the screen,
//! publishes finished recordings as lessons and keeps the class chat.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use liveclass::{CaptureMode, LiveClassBuilder, MockPlatform, MockSurface};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), liveclass::LiveClassError> {
//!     liveclass::init_logging();
//!
//!     let mut controller = LiveClassBuilder::new()
//!         .platform(Arc::new(MockPlatform::new()))
//!         .local_surface(MockSurface::new("local"))
//!         .build()?;
//!
//!     controller.load_classes().await?;
//!     controller.join("1", true).await?;
//!
//!     controller.start_recording(CaptureMode::Camera).await?;
//!     controller.stop_recording().await?;
//!
//!     controller.set_lesson_title("Algebra basics");
//!     let lesson_id = controller.publish_lesson().await?;
//!     println!("Published {}", lesson_id);
//!
//!     controller.leave().await;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use liveclass_core::{
    CaptureMode, ClassSession, ClassStatus, ClassroomService, MockClassroomService,
    RecordingUpload, ServiceError, UploadProgress,
};

pub use liveclass_media::{
    Device, DeviceEnumerator, DeviceKind, DeviceList, DeviceRegistry, MediaError,
    MediaPlatform, MediaStream, MockPlatform, MockSurface, RecordingEvent, RecordingState,
    RenderSurface,
};

#[cfg(feature = "service")]
pub use liveclass_service::{ClassroomServer, WebSocketClassroomService};

// Public API modules
pub mod chat;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod publish;
pub mod slides;

// Re-export main API types
pub use chat::{ChatLog, ChatMessage};
pub use config::ControllerConfig;
pub use controller::{JoinState, LiveClassController, Role};
pub use error::{ErrorCategory, LiveClassError, LiveClassResult};
pub use event::{EventStream, LiveClassEvent};
pub use publish::PublishWorkflow;
pub use slides::SlideDeck;

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber printing to stderr
///
/// The filter comes from `RUST_LOG`, defaulting to `liveclass=info`. Calling
/// this more than once, or after another subscriber was installed, does
/// nothing.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("liveclass=info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Assembles a [`LiveClassController`]
///
/// Only the platform is required. Without an explicit service the WebSocket
/// client is used when `service_url` is configured, and the in-memory
/// service otherwise.
#[derive(Default)]
pub struct LiveClassBuilder {
    platform: Option<Arc<dyn MediaPlatform>>,
    service: Option<Arc<dyn ClassroomService>>,
    enumerator: Option<Arc<dyn DeviceEnumerator>>,
    config: ControllerConfig,
    local_surface: Option<Arc<dyn RenderSurface>>,
    remote_surface: Option<Arc<dyn RenderSurface>>,
}

impl LiveClassBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture platform (required)
    pub fn platform(mut self, platform: Arc<dyn MediaPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Classroom service
    pub fn service(mut self, service: Arc<dyn ClassroomService>) -> Self {
        self.service = Some(service);
        self
    }

    /// List devices through `enumerator` instead of the platform
    pub fn enumerator(mut self, enumerator: Arc<dyn DeviceEnumerator>) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    /// Controller configuration
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Surface showing our own camera
    pub fn local_surface(mut self, surface: Arc<dyn RenderSurface>) -> Self {
        self.local_surface = Some(surface);
        self
    }

    /// Surface for the other side of the class
    pub fn remote_surface(mut self, surface: Arc<dyn RenderSurface>) -> Self {
        self.remote_surface = Some(surface);
        self
    }

    /// Build the controller
    pub fn build(self) -> LiveClassResult<LiveClassController> {
        let platform = self
            .platform
            .ok_or_else(|| LiveClassError::MissingConfiguration {
                field: "platform".to_string(),
            })?;
        self.config.validate()?;

        let service = match self.service {
            Some(service) => service,
            None => default_service(&self.config),
        };
        let devices = match self.enumerator {
            Some(enumerator) => DeviceRegistry::with_enumerator(platform.clone(), enumerator),
            None => DeviceRegistry::new(platform.clone()),
        };

        let mut controller = LiveClassController::new(self.config, platform, service, devices);
        if let Some(surface) = self.local_surface {
            controller.set_local_surface(surface);
        }
        if let Some(surface) = self.remote_surface {
            controller.set_remote_surface(surface);
        }
        Ok(controller)
    }
}

#[cfg(feature = "service")]
fn default_service(config: &ControllerConfig) -> Arc<dyn ClassroomService> {
    match &config.service_url {
        Some(url) => {
            info!("Using classroom service at {}", url);
            Arc::new(WebSocketClassroomService::new(url.clone()))
        }
        None => {
            info!("No service URL configured, using in-memory classroom service");
            Arc::new(MockClassroomService::new())
        }
    }
}

#[cfg(not(feature = "service"))]
fn default_service(config: &ControllerConfig) -> Arc<dyn ClassroomService> {
    if let Some(url) = &config.service_url {
        tracing::warn!(
            "Ignoring service URL {}: built without the `service` feature",
            url
        );
    }
    info!("Using in-memory classroom service");
    Arc::new(MockClassroomService::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_platform() {
        let result = LiveClassBuilder::new().build();
        assert!(matches!(
            result,
            Err(LiveClassError::MissingConfiguration { ref field }) if field == "platform"
        ));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = ControllerConfig {
            total_slides: 0,
            ..ControllerConfig::default()
        };
        let result = LiveClassBuilder::new()
            .platform(Arc::new(MockPlatform::new()))
            .config(config)
            .build();
        assert!(matches!(
            result,
            Err(LiveClassError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn test_builder_defaults() {
        let controller = LiveClassBuilder::new()
            .platform(Arc::new(MockPlatform::new()))
            .build()
            .unwrap();
        assert!(!controller.is_joined());
        assert!(controller.video_enabled());
        assert!(controller.audio_enabled());
        assert_eq!(controller.slides().total(), 5);
        assert_eq!(controller.recording_state(), RecordingState::Idle);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
