//! Validation of inbound `send_message` requests.

use messenger_core::models::MessageType;
use messenger_core::types::{ChatId, MessageId};

use super::types::{ErrorCode, SendMessagePayload};

/// A `send_message` request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// Target chat.
    pub chat_id: ChatId,
    /// Message text.
    pub content: String,
    /// Resolved message type.
    pub message_type: MessageType,
    /// Message being replied to.
    pub reply_to: Option<MessageId>,
}

/// Why a request was rejected, as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Error code sent back.
    pub code: ErrorCode,
    /// Error message sent back.
    pub message: String,
}

impl Rejection {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Validate a `send_message` request.
pub fn validate_send(
    chat_id: Option<ChatId>,
    payload: SendMessagePayload,
) -> Result<SendRequest, Rejection> {
    let chat_id = match chat_id {
        Some(id) if !id.is_nil() => id,
        _ => return Err(Rejection::new(ErrorCode::DataIsEmpty, "Chat ID is required")),
    };

    if payload.content.trim().is_empty() {
        return Err(Rejection::new(
            ErrorCode::DataIsEmpty,
            "Message content is required",
        ));
    }

    let message_type = if payload.message_type.is_empty() {
        MessageType::Text
    } else {
        payload.message_type.parse::<MessageType>().map_err(|_| {
            Rejection::new(
                ErrorCode::InvalidPayload,
                format!("Unknown message type '{}'", payload.message_type),
            )
        })?
    };

    Ok(SendRequest {
        chat_id,
        content: payload.content,
        message_type,
        reply_to: payload.reply_to,
    })
}
