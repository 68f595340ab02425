//! Native device enumeration
//!
//! Lists cameras through nokhwa and microphones through cpal. Both backends
//! block, so enumeration runs on the blocking pool.

use crate::device::{Device, DeviceKind};
use crate::error::{MediaError, MediaResult};
use crate::platform::DeviceEnumerator;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use nokhwa::utils::{ApiBackend, CameraIndex};
use tracing::{debug, warn};

/// Enumerates the host's real capture hardware
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDeviceEnumerator;

impl NativeDeviceEnumerator {
    /// Create an enumerator
    pub fn new() -> Self {
        Self
    }

    fn cameras() -> Vec<Device> {
        match nokhwa::query(ApiBackend::Auto) {
            Ok(cameras) => cameras
                .into_iter()
                .map(|info| {
                    let id = match info.index() {
                        CameraIndex::Index(i) => i.to_string(),
                        CameraIndex::String(s) => s.to_string(),
                    };
                    Device::new(id, DeviceKind::Camera, info.human_name())
                })
                .collect(),
            Err(e) => {
                warn!("Failed to enumerate cameras: {:?}", e);
                Vec::new()
            }
        }
    }

    fn microphones() -> MediaResult<Vec<Device>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| MediaError::DeviceEnumerationFailed {
                reason: format!("Failed to enumerate input devices: {}", e),
            })?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = device.name().unwrap_or_default();
                let id = if name.is_empty() {
                    format!("input-{}", index)
                } else {
                    name.clone()
                };
                Device::new(id, DeviceKind::Microphone, name)
            })
            .collect())
    }
}

#[async_trait]
impl DeviceEnumerator for NativeDeviceEnumerator {
    async fn enumerate_devices(&self) -> MediaResult<Vec<Device>> {
        let devices = tokio::task::spawn_blocking(|| -> MediaResult<Vec<Device>> {
            let mut devices = Self::cameras();
            devices.extend(Self::microphones()?);
            Ok(devices)
        })
        .await
        .map_err(|e| MediaError::DeviceEnumerationFailed {
            reason: format!("enumeration task failed: {}", e),
        })??;

        debug!("Native enumeration found {} device(s)", devices.len());
        Ok(devices)
    }
}
