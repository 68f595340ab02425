//! Controller events and the stream that delivers them

use crate::chat::ChatMessage;
use crate::controller::Role;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

/// Capacity of the controller event channel
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Something the user interface should react to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LiveClassEvent {
    /// The class list was refreshed
    ClassesLoaded {
        /// Number of classes in the list
        count: usize,
    },
    /// A class was joined
    Joined {
        /// Joined class
        class_id: String,
        /// Role we joined with
        role: Role,
    },
    /// The class was left
    Left {
        /// Class that was left
        class_id: String,
    },
    /// A line was added to the chat
    ChatMessage {
        /// The new message
        message: ChatMessage,
    },
    /// The hand went up or down
    HandRaised {
        /// Whether the hand is now raised
        raised: bool,
    },
    /// Camera switched on or off
    VideoToggled {
        /// New state
        enabled: bool,
    },
    /// Microphone switched on or off
    AudioToggled {
        /// New state
        enabled: bool,
    },
    /// The lesson upload advanced
    UploadProgress {
        /// Percentage in `[0, 100]`
        percent: u8,
    },
    /// A lesson was published
    Published {
        /// Identifier assigned by the service
        lesson_id: String,
    },
    /// A failure the user should see
    Error {
        /// User-facing message
        message: String,
    },
}

impl LiveClassEvent {
    /// Get event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            LiveClassEvent::ClassesLoaded { .. } => "classes_loaded",
            LiveClassEvent::Joined { .. } => "joined",
            LiveClassEvent::Left { .. } => "left",
            LiveClassEvent::ChatMessage { .. } => "chat_message",
            LiveClassEvent::HandRaised { .. } => "hand_raised",
            LiveClassEvent::VideoToggled { .. } => "video_toggled",
            LiveClassEvent::AudioToggled { .. } => "audio_toggled",
            LiveClassEvent::UploadProgress { .. } => "upload_progress",
            LiveClassEvent::Published { .. } => "published",
            LiveClassEvent::Error { .. } => "error",
        }
    }

    /// Check if this is an error event
    pub fn is_error(&self) -> bool {
        matches!(self, LiveClassEvent::Error { .. })
    }
}

/// Receiving end of the controller's events
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<LiveClassEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<LiveClassEvent>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream
    ///
    /// Returns `None` once the controller is gone. Events missed because the
    /// reader fell behind are skipped.
    pub async fn next(&mut self) -> Option<LiveClassEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Event stream lagged, {} event(s) dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<LiveClassEvent>, broadcast::error::TryRecvError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Ok(Some(event)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!("Event stream lagged, {} event(s) dropped", missed);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drain every event already queued
    pub fn drain(&mut self) -> Vec<LiveClassEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_next() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let event = LiveClassEvent::Joined {
            class_id: "1".to_string(),
            role: Role::Teacher,
        };
        assert_eq!(event.event_type(), "joined");
        assert!(!event.is_error());
        assert!(LiveClassEvent::Error {
            message: "Upload failed".to_string()
        }
        .is_error());
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_value(LiveClassEvent::HandRaised { raised: true }).unwrap();
        assert_eq!(json["type"], "handRaised");
        assert_eq!(json["raised"], true);
    }

    #[tokio::test]
    async fn test_stream_ends_with_sender() {
        let (tx, rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut stream = EventStream::new(rx);
        tx.send(LiveClassEvent::Left {
            class_id: "1".to_string(),
        })
        .unwrap();
        drop(tx);

        assert_eq!(stream.next().await.map(|e| e.event_type()), Some("left"));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_drain() {
        let (tx, rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut stream = EventStream::new(rx);
        tx.send(LiveClassEvent::VideoToggled { enabled: false })
            .unwrap();
        tx.send(LiveClassEvent::AudioToggled { enabled: false })
            .unwrap();
        assert_eq!(stream.drain().len(), 2);
        assert!(matches!(stream.try_next(), Ok(None)));
    }
}
