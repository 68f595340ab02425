//! # Live Class Media
//!
//! Capture side of the live-class controller: the device registry, the local
//! media session and the recording engine, all written against the platform
//! traits in [`platform`]. [`mock`] provides an in-process platform; the
//! `native` feature adds a hardware device enumerator.

#![warn(clippy::all)]

pub mod device;
pub mod devices;
pub mod error;
pub mod mock;
#[cfg(feature = "native")]
pub mod native;
pub mod platform;
pub mod recording;
pub mod session;
pub mod stream;

// Re-export main types
pub use device::{Device, DeviceKind};
pub use devices::{DeviceList, DeviceRegistry};
pub use error::{ErrorCategory, MediaError, MediaResult, PlaybackError};
pub use mock::{MockPlatform, MockRecorder, MockSurface};
#[cfg(feature = "native")]
pub use native::NativeDeviceEnumerator;
pub use platform::{
    AudioConstraint, DeviceEnumerator, FacingMode, MediaConstraints, MediaPlatform,
    MediaRecorder, RenderSurface, VideoConstraint,
};
pub use recording::{
    format_elapsed, RecordingArtifact, RecordingConfig, RecordingEngine, RecordingEvent,
    RecordingState, SealedRecording,
};
pub use session::{MediaSession, DEFAULT_ATTACH_TIMEOUT, DEFAULT_MIC_TEST_DURATION};
pub use stream::{MediaStream, MediaStreamTrack, TrackKind};
