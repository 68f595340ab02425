//! Classroom chat log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sender name of messages generated by the controller
pub const SYSTEM_SENDER: &str = "System";

/// One chat line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique message ID
    pub id: Uuid,
    /// Display name of the sender
    pub sender: String,
    /// Message text
    pub text: String,
    /// When the message was added
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message stamped with the current time
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Whether the controller generated this message
    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }
}

/// Append-only message list
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return a copy of it
    pub fn push(&mut self, sender: impl Into<String>, text: impl Into<String>) -> ChatMessage {
        let message = ChatMessage::new(sender, text);
        self.messages.push(message.clone());
        message
    }

    /// Append a controller-generated message
    pub fn push_system(&mut self, text: impl Into<String>) -> ChatMessage {
        self.push(SYSTEM_SENDER, text)
    }

    /// Messages in the order they were added
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
