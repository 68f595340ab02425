//! Device registry
//!
//! Keeps the current camera/microphone lists and the user's selection. Lists
//! are refreshed on demand and, once [`DeviceRegistry::watch`] is called, every
//! time the platform reports a hot-plug event.
//!
//! Enumeration failures never reach the caller: they are logged and leave the
//! lists empty.

use crate::device::{Device, DeviceKind};
use crate::error::MediaResult;
use crate::platform::{DeviceEnumerator, MediaConstraints, MediaPlatform};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Snapshot of known devices and the current selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceList {
    /// Video inputs in platform order
    pub cameras: Vec<Device>,
    /// Audio inputs in platform order
    pub microphones: Vec<Device>,
    /// Selected camera id
    pub selected_camera: Option<String>,
    /// Selected microphone id
    pub selected_microphone: Option<String>,
}

impl DeviceList {
    /// Devices of one kind
    pub fn devices(&self, kind: DeviceKind) -> &[Device] {
        match kind {
            DeviceKind::Camera => &self.cameras,
            DeviceKind::Microphone => &self.microphones,
        }
    }

    /// Selected device id of one kind
    pub fn selected(&self, kind: DeviceKind) -> Option<&str> {
        match kind {
            DeviceKind::Camera => self.selected_camera.as_deref(),
            DeviceKind::Microphone => self.selected_microphone.as_deref(),
        }
    }

    /// The selected device of one kind, if it is currently present
    pub fn selected_device(&self, kind: DeviceKind) -> Option<&Device> {
        let id = self.selected(kind)?;
        self.devices(kind).iter().find(|d| d.id == id)
    }

    fn selection_mut(&mut self, kind: DeviceKind) -> &mut Option<String> {
        match kind {
            DeviceKind::Camera => &mut self.selected_camera,
            DeviceKind::Microphone => &mut self.selected_microphone,
        }
    }

    fn replace_devices(&mut self, devices: Vec<Device>) {
        let (cameras, microphones): (Vec<_>, Vec<_>) = devices
            .into_iter()
            .partition(|d| d.kind == DeviceKind::Camera);
        self.cameras = cameras;
        self.microphones = microphones;

        for kind in [DeviceKind::Camera, DeviceKind::Microphone] {
            let first = self.devices(kind).first().map(|d| d.id.clone());
            let selection = self.selection_mut(kind);
            if selection.is_none() {
                *selection = first;
            }
        }
    }
}

struct RegistryInner {
    platform: Arc<dyn MediaPlatform>,
    enumerator: Option<Arc<dyn DeviceEnumerator>>,
    state: watch::Sender<DeviceList>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl RegistryInner {
    async fn enumerate(&self) -> MediaResult<Vec<Device>> {
        match &self.enumerator {
            Some(enumerator) => enumerator.enumerate_devices().await,
            None => self.platform.enumerate_devices().await,
        }
    }

    /// Enumerate, priming capture permission once if labels are hidden
    async fn enumerate_with_labels(&self) -> MediaResult<Vec<Device>> {
        let devices = self.enumerate().await?;
        if devices.iter().all(Device::has_label) {
            return Ok(devices);
        }

        debug!("Device labels hidden, priming capture permission");
        match self
            .platform
            .get_user_media(&MediaConstraints::any_audio_video())
            .await
        {
            Ok(stream) => {
                stream.stop_all();
                self.enumerate().await
            }
            Err(e) => {
                warn!("Permission priming failed, keeping unlabeled devices: {}", e);
                Ok(devices)
            }
        }
    }

    async fn refresh(&self) -> DeviceList {
        let devices = match self.enumerate_with_labels().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate devices: {}", e);
                Vec::new()
            }
        };

        self.state.send_modify(|list| list.replace_devices(devices));
        let list = self.state.borrow().clone();
        debug!(
            "Devices: {} camera(s), {} microphone(s)",
            list.cameras.len(),
            list.microphones.len()
        );
        list
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        if let Some(task) = self.watcher.get_mut().take() {
            task.abort();
        }
    }
}

/// Camera and microphone registry
///
/// Clones share the same lists, selection and watcher.
#[derive(Clone)]
pub struct DeviceRegistry {
    inner: Arc<RegistryInner>,
}

impl DeviceRegistry {
    /// Create a registry enumerating through `platform`
    pub fn new(platform: Arc<dyn MediaPlatform>) -> Self {
        let (state, _) = watch::channel(DeviceList::default());
        Self {
            inner: Arc::new(RegistryInner {
                platform,
                enumerator: None,
                state,
                watcher: Mutex::new(None),
            }),
        }
    }

    /// Create a registry that lists devices through a dedicated enumerator
    ///
    /// Permission priming and hot-plug notifications still go through
    /// `platform`.
    pub fn with_enumerator(
        platform: Arc<dyn MediaPlatform>,
        enumerator: Arc<dyn DeviceEnumerator>,
    ) -> Self {
        let (state, _) = watch::channel(DeviceList::default());
        Self {
            inner: Arc::new(RegistryInner {
                platform,
                enumerator: Some(enumerator),
                state,
                watcher: Mutex::new(None),
            }),
        }
    }

    /// Re-enumerate devices and fill default selections
    pub async fn list_devices(&self) -> DeviceList {
        self.inner.refresh().await
    }

    /// Record an explicit device choice; never starts a capture
    pub fn select_device(&self, kind: DeviceKind, device_id: impl Into<String>) {
        let device_id = device_id.into();
        info!("Selected {}: {}", kind, device_id);
        self.inner
            .state
            .send_modify(|list| *list.selection_mut(kind) = Some(device_id));
    }

    /// Current lists and selection
    pub fn snapshot(&self) -> DeviceList {
        self.inner.state.borrow().clone()
    }

    /// Selected device id of one kind
    pub fn selected(&self, kind: DeviceKind) -> Option<String> {
        self.inner.state.borrow().selected(kind).map(str::to_string)
    }

    /// Receive every list/selection change
    pub fn subscribe(&self) -> watch::Receiver<DeviceList> {
        self.inner.state.subscribe()
    }

    /// Re-enumerate whenever the platform reports a device change
    ///
    /// Replaces any previous watcher. Must be called inside a tokio runtime.
    pub fn watch(&self) {
        let mut changes = self.inner.platform.device_changes();
        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        debug!("Device change detected, re-enumerating");
                        inner.refresh().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = self.inner.watcher.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stop reacting to device changes
    pub fn unwatch(&self) {
        if let Some(task) = self.inner.watcher.lock().take() {
            task.abort();
        }
    }

    /// Whether a hot-plug watcher is running
    pub fn is_watching(&self) -> bool {
        self.inner
            .watcher
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &*self.inner.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use crate::mock::MockPlatform;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingEnumerator;

    #[async_trait]
    impl DeviceEnumerator for FailingEnumerator {
        async fn enumerate_devices(&self) -> MediaResult<Vec<Device>> {
            Err(MediaError::DeviceEnumerationFailed {
                reason: "backend offline".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_defaults_to_first_device() {
        let platform = Arc::new(MockPlatform::new());
        let registry = DeviceRegistry::new(platform);

        let list = registry.list_devices().await;
        assert_eq!(list.cameras.len(), 1);
        assert_eq!(list.selected_camera.as_deref(), Some(list.cameras[0].id.as_str()));
        assert_eq!(
            list.selected_microphone.as_deref(),
            Some(list.microphones[0].id.as_str())
        );
    }

    #[tokio::test]
    async fn test_select_device_survives_refresh() {
        let platform = Arc::new(MockPlatform::new());
        platform.plug_device(Device::new("cam-2", DeviceKind::Camera, "USB Camera"));
        let registry = DeviceRegistry::new(platform.clone());

        registry.list_devices().await;
        registry.select_device(DeviceKind::Camera, "cam-2");
        let list = registry.list_devices().await;
        assert_eq!(list.selected_camera.as_deref(), Some("cam-2"));
        assert!(platform.user_media_requests().is_empty());
    }

    #[tokio::test]
    async fn test_hidden_labels_prime_permission_once() {
        let platform = Arc::new(MockPlatform::with_hidden_labels());
        let registry = DeviceRegistry::new(platform.clone());

        let list = registry.list_devices().await;
        assert!(list.cameras.iter().all(Device::has_label));
        assert_eq!(platform.user_media_requests().len(), 1);
        assert_eq!(platform.enumerate_calls(), 2);
        assert!(platform.issued_streams().iter().all(|s| !s.is_active()));
    }

    #[tokio::test]
    async fn test_priming_denied_keeps_unlabeled_devices() {
        let platform = Arc::new(MockPlatform::with_hidden_labels());
        platform.set_deny_camera(true);
        let registry = DeviceRegistry::new(platform.clone());

        let list = registry.list_devices().await;
        assert_eq!(list.cameras.len(), 1);
        assert_eq!(list.cameras[0].display_label(), "Default Camera");
        assert_eq!(platform.enumerate_calls(), 1);
    }

    #[tokio::test]
    async fn test_enumeration_failure_leaves_lists_empty() {
        let platform = Arc::new(MockPlatform::new());
        let registry = DeviceRegistry::with_enumerator(platform, Arc::new(FailingEnumerator));

        let list = registry.list_devices().await;
        assert!(list.cameras.is_empty());
        assert!(list.microphones.is_empty());
        assert!(list.selected_camera.is_none());
    }

    #[tokio::test]
    async fn test_watch_picks_up_hotplug() {
        let platform = Arc::new(MockPlatform::new());
        let registry = DeviceRegistry::new(platform.clone());
        registry.list_devices().await;
        let mut updates = registry.subscribe();

        registry.watch();
        assert!(registry.is_watching());
        platform.plug_device(Device::new("mic-2", DeviceKind::Microphone, "Headset"));

        tokio::time::timeout(Duration::from_secs(1), updates.changed())
            .await
            .expect("hot-plug refresh")
            .unwrap();
        assert_eq!(registry.snapshot().microphones.len(), 2);

        registry.unwatch();
        assert!(!registry.is_watching());
    }
}
