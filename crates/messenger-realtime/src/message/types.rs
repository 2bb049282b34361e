//! Inbound and outbound envelope definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use messenger_core::models::ChatMessage;
use messenger_core::types::{ChatId, EventId, MessageId};

/// Envelope received from a client.
///
/// `type` selects the request; `payload` is interpreted per type. Unknown
/// fields such as a client-side `timestamp` are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingEnvelope {
    /// Request type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Request body.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Chat the request targets.
    #[serde(default)]
    pub chat_id: Option<ChatId>,
}

impl IncomingEnvelope {
    /// Resolve the request type tag.
    pub fn request_type(&self) -> Option<RequestType> {
        RequestType::parse(&self.kind)
    }
}

/// Request types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    /// Post a message into a chat.
    SendMessage,
}

impl RequestType {
    /// Parse a wire tag.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "send_message" => Some(Self::SendMessage),
            _ => None,
        }
    }
}

/// Body of a `send_message` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessagePayload {
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// Message type tag; empty means `text`.
    #[serde(rename = "type", default)]
    pub message_type: String,
    /// Message this one replies to.
    #[serde(default)]
    pub reply_to: Option<MessageId>,
}

/// Event types emitted to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A message was accepted into a chat.
    #[serde(rename = "message.sent")]
    MessageSent,
    /// A request from this client failed.
    #[serde(rename = "error")]
    Error,
}

/// Envelope sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEnvelope {
    /// Event type tag.
    #[serde(rename = "type")]
    pub event: EventType,
    /// Event body.
    pub payload: serde_json::Value,
    /// Delivery metadata.
    pub meta: EnvelopeMeta,
}

/// Metadata attached to every outgoing envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    /// When the envelope was built.
    pub timestamp: DateTime<Utc>,
    /// Unique id of this event.
    pub event_id: EventId,
    /// Chat the event belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ChatId>,
}

/// Body of a `message.sent` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSentPayload {
    /// The persisted message.
    pub message: ChatMessage,
}

/// Error codes reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The frame was not a JSON envelope.
    InvalidMessageFormat,
    /// The envelope named an unsupported request type.
    InvalidMessageType,
    /// The request body did not match its type.
    InvalidPayload,
    /// A required field was missing or empty.
    DataIsEmpty,
    /// The sender is not a member of the chat.
    AccessDenied,
    /// The message could not be stored.
    SaveFailed,
    /// The server failed to build a response.
    InternalError,
}

/// Body of an `error` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional extra context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
