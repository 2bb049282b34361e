//! Chat message model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::{ChatId, MessageId, UserId};

/// Kind of content carried by a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text.
    #[default]
    Text,
    /// File attachment reference.
    File,
    /// Image attachment reference.
    Image,
    /// System-generated notice.
    System,
}

impl MessageType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
            Self::Image => "image",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "file" => Ok(Self::File),
            "image" => Ok(Self::Image),
            "system" => Ok(Self::System),
            _ => Err(AppError::validation(format!(
                "Invalid message type: '{s}'. Expected one of: text, file, image, system"
            ))),
        }
    }
}

/// A chat message that has been accepted for delivery.
///
/// Built only after the repository confirmed the write; never mutated
/// afterwards by the delivery engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier (the persisted id once saved).
    pub id: MessageId,
    /// Chat the message belongs to.
    pub chat_id: ChatId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Message body.
    pub content: String,
    /// Content kind.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Message this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    /// When the server accepted the message.
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new message with a provisional id stamped now.
    pub fn new(
        chat_id: ChatId,
        sender_id: UserId,
        content: impl Into<String>,
        message_type: MessageType,
        reply_to: Option<MessageId>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            chat_id,
            sender_id,
            content: content.into(),
            message_type,
            reply_to,
            sent_at: Utc::now(),
        }
    }

    /// Replace the provisional id with the one assigned by the repository.
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }
}
