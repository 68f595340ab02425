//! Integration tests for the device registry and the media session

use liveclass_media::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

// ============================================================================
// DEVICE REGISTRY TESTS
// ============================================================================

#[tokio::test]
async fn test_hidden_labels_trigger_reenumeration() {
    let platform = Arc::new(MockPlatform::with_hidden_labels());
    let registry = DeviceRegistry::new(platform.clone());

    let list = registry.list_devices().await;

    assert_eq!(platform.user_media_requests().len(), 1);
    assert_eq!(
        platform.user_media_requests()[0],
        MediaConstraints::any_audio_video()
    );
    assert_eq!(list.cameras[0].label, "FaceTime HD Camera");
    assert_eq!(list.microphones[0].label, "Built-in Microphone");
}

#[tokio::test]
async fn test_labeled_devices_skip_priming() {
    let platform = Arc::new(MockPlatform::new());
    let registry = DeviceRegistry::new(platform.clone());

    registry.list_devices().await;
    registry.list_devices().await;
    assert!(platform.user_media_requests().is_empty());
    assert_eq!(platform.enumerate_calls(), 2);
}

#[tokio::test]
async fn test_failed_enumeration_is_not_an_error() {
    let platform = Arc::new(MockPlatform::new());
    platform.set_fail_enumeration(true);
    let registry = DeviceRegistry::new(platform);

    let list = registry.list_devices().await;
    assert_eq!(list, DeviceList::default());
}

#[tokio::test]
async fn test_selection_kept_when_device_unplugged() {
    let platform = Arc::new(MockPlatform::new());
    platform.plug_device(Device::new("cam-2", DeviceKind::Camera, "USB Camera"));
    let registry = DeviceRegistry::new(platform.clone());
    registry.select_device(DeviceKind::Camera, "cam-2");

    registry.watch();
    let mut updates = registry.subscribe();
    platform.unplug_device("cam-2");
    assert_ok!(tokio::time::timeout(Duration::from_secs(1), updates.changed()).await);

    let list = registry.snapshot();
    assert_eq!(list.cameras.len(), 1);
    assert_eq!(list.selected(DeviceKind::Camera), Some("cam-2"));
    assert!(list.selected_device(DeviceKind::Camera).is_none());
}

#[tokio::test]
async fn test_dropping_registry_stops_watcher() {
    let platform = Arc::new(MockPlatform::new());
    let registry = DeviceRegistry::new(platform.clone());
    registry.watch();
    drop(registry);

    tokio::task::yield_now().await;
    platform.plug_device(Device::new("mic-2", DeviceKind::Microphone, "Headset"));
    tokio::task::yield_now().await;
    assert_eq!(platform.enumerate_calls(), 0);
}

// ============================================================================
// MEDIA SESSION TESTS
// ============================================================================

#[tokio::test]
async fn test_toggle_parity() {
    let platform = Arc::new(MockPlatform::new());
    let mut session = MediaSession::new(platform);
    let stream = session.acquire(None, None).await.unwrap();

    let mut video_enabled = true;
    for _ in 0..7 {
        video_enabled = !video_enabled;
        assert_ok!(session.set_video_enabled(video_enabled));
    }
    assert!(!video_enabled);
    assert!(stream.video_tracks().all(|t| !t.is_enabled()));
    assert!(stream.audio_tracks().all(|t| t.is_enabled()));
}

#[tokio::test]
async fn test_acquire_honors_device_choice() {
    let platform = Arc::new(MockPlatform::new());
    platform.plug_device(Device::new("cam-2", DeviceKind::Camera, "USB Camera"));
    let mut session = MediaSession::new(platform.clone());

    let stream = session.acquire(Some("cam-2"), None).await.unwrap();
    assert_eq!(stream.video_tracks().next().map(|t| t.label()), Some("USB Camera"));

    let requests = platform.user_media_requests();
    assert_eq!(
        requests[0].video,
        Some(VideoConstraint::Device("cam-2".to_string()))
    );
    assert_eq!(requests[0].audio, Some(AudioConstraint::Any));
}

#[tokio::test]
async fn test_default_request_uses_front_camera() {
    let platform = Arc::new(MockPlatform::new());
    let mut session = MediaSession::new(platform.clone());
    session.acquire(None, None).await.unwrap();

    assert_eq!(
        platform.user_media_requests()[0].video,
        Some(VideoConstraint::FacingMode(FacingMode::User))
    );
}

#[tokio::test]
async fn test_denied_capture_holds_nothing() {
    let platform = Arc::new(MockPlatform::new());
    platform.set_deny_microphone(true);
    let mut session = MediaSession::new(platform);

    let result = session.acquire(None, None).await;
    assert!(matches!(result, Err(MediaError::PermissionDenied { .. })));
    assert!(!session.is_active());
}
