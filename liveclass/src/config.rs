//! Configuration types and defaults

use crate::error::{LiveClassError, LiveClassResult};
use liveclass_media::{RecordingConfig, DEFAULT_ATTACH_TIMEOUT, DEFAULT_MIC_TEST_DURATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of slides in a presentation deck
pub const DEFAULT_TOTAL_SLIDES: u32 = 5;

/// Controller configuration
///
/// Durations are written in milliseconds when serialized. Every field has a
/// default, so a partial JSON document is enough:
///
/// ```rust
/// use liveclass::ControllerConfig;
///
/// let config = ControllerConfig::from_json(r#"{ "chunk_interval": 250 }"#)?;
/// assert_eq!(config.chunk_interval.as_millis(), 250);
/// assert_eq!(config.total_slides, 5);
/// # Ok::<(), liveclass::LiveClassError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Bound on the wait for a surface's metadata
    #[serde(with = "millis")]
    pub attach_timeout: Duration,
    /// How often the recorder delivers a chunk
    #[serde(with = "millis")]
    pub chunk_interval: Duration,
    /// Resolution of the recording timer
    #[serde(with = "millis")]
    pub tick_interval: Duration,
    /// Recording container/codec preferences, best first
    pub preferred_mime_types: Vec<String>,
    /// How long the microphone self-test plays back
    #[serde(with = "millis")]
    pub mic_test_duration: Duration,
    /// Slides in the presentation deck
    pub total_slides: u32,
    /// WebSocket URL of the classroom service; the in-memory service is used when unset
    pub service_url: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let recording = RecordingConfig::default();
        Self {
            attach_timeout: DEFAULT_ATTACH_TIMEOUT,
            chunk_interval: recording.chunk_interval,
            tick_interval: recording.tick_interval,
            preferred_mime_types: recording.preferred_mime_types,
            mic_test_duration: DEFAULT_MIC_TEST_DURATION,
            total_slides: DEFAULT_TOTAL_SLIDES,
            service_url: None,
        }
    }
}

impl ControllerConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> LiveClassResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LiveClassError::InvalidConfiguration {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> LiveClassResult<()> {
        let invalid = |reason: &str| {
            Err(LiveClassError::InvalidConfiguration {
                reason: reason.to_string(),
            })
        };
        if self.chunk_interval.is_zero() {
            return invalid("chunk_interval must be positive");
        }
        if self.tick_interval.is_zero() {
            return invalid("tick_interval must be positive");
        }
        if self.preferred_mime_types.is_empty() {
            return invalid("preferred_mime_types must not be empty");
        }
        if self.total_slides == 0 {
            return invalid("total_slides must be at least 1");
        }
        Ok(())
    }

    /// Recorder settings derived from this configuration
    pub fn recording_config(&self) -> RecordingConfig {
        RecordingConfig {
            chunk_interval: self.chunk_interval,
            tick_interval: self.tick_interval,
            preferred_mime_types: self.preferred_mime_types.clone(),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.attach_timeout, Duration::from_millis(500));
        assert_eq!(config.chunk_interval, Duration::from_millis(100));
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.mic_test_duration, Duration::from_secs(2));
        assert_eq!(config.preferred_mime_types[0], "video/webm;codecs=vp8,opus");
        assert!(config.service_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = ControllerConfig::from_json(
            r#"{ "attach_timeout": 50, "service_url": "ws://127.0.0.1:9000" }"#,
        )
        .unwrap();
        assert_eq!(config.attach_timeout, Duration::from_millis(50));
        assert_eq!(config.service_url.as_deref(), Some("ws://127.0.0.1:9000"));
        assert_eq!(config.total_slides, DEFAULT_TOTAL_SLIDES);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            ControllerConfig::from_json(r#"{ "chunk_interval": 0 }"#),
            Err(LiveClassError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            ControllerConfig::from_json("not json"),
            Err(LiveClassError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_round_trip_keeps_millis() {
        let json = serde_json::to_value(ControllerConfig::default()).unwrap();
        assert_eq!(json["chunk_interval"], 100);
        assert_eq!(json["mic_test_duration"], 2000);
    }
}
