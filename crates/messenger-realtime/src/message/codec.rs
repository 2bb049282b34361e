//! Envelope codec: builds outgoing envelopes and converts frames to and
//! from JSON.
//!
//! Outgoing envelopes are encoded once and the resulting bytes are shared
//! across every recipient of a fan-out.

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::error;

use messenger_core::models::ChatMessage;
use messenger_core::types::{ChatId, EventId};

use super::types::{
    EnvelopeMeta, ErrorCode, ErrorPayload, EventType, IncomingEnvelope, MessageSentPayload,
    OutgoingEnvelope,
};

/// Message used when a payload cannot be converted to JSON.
const FALLBACK_MESSAGE: &str = "Failed to create event";

/// Last-resort frame when an envelope itself cannot be encoded.
const FALLBACK_FRAME: &str =
    r#"{"type":"error","payload":{"code":"internal_error","message":"Failed to create event"}}"#;

/// Build an envelope around an arbitrary payload.
///
/// If the payload cannot be converted to JSON the result is an `error`
/// envelope carrying `internal_error` instead.
pub fn build_envelope<T: Serialize>(
    event: EventType,
    payload: &T,
    chat_id: Option<ChatId>,
) -> OutgoingEnvelope {
    match serde_json::to_value(payload) {
        Ok(payload) => OutgoingEnvelope {
            event,
            payload,
            meta: meta(chat_id),
        },
        Err(e) => {
            error!(error = %e, event = ?event, "Failed to serialize envelope payload");
            OutgoingEnvelope {
                event: EventType::Error,
                payload: serde_json::json!({
                    "code": ErrorCode::InternalError,
                    "message": FALLBACK_MESSAGE,
                }),
                meta: meta(None),
            }
        }
    }
}

/// Build a `message.sent` envelope for a persisted message.
pub fn message_sent(message: &ChatMessage) -> OutgoingEnvelope {
    build_envelope(
        EventType::MessageSent,
        &MessageSentPayload {
            message: message.clone(),
        },
        Some(message.chat_id),
    )
}

/// Build an `error` envelope.
pub fn error_envelope(
    code: ErrorCode,
    message: impl Into<String>,
    details: Option<String>,
) -> OutgoingEnvelope {
    build_envelope(
        EventType::Error,
        &ErrorPayload {
            code,
            message: message.into(),
            details,
        },
        None,
    )
}

/// Encode an envelope into frame bytes.
pub fn encode(envelope: &OutgoingEnvelope) -> Bytes {
    match serde_json::to_vec(envelope) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            error!(error = %e, "Failed to encode envelope");
            Bytes::from_static(FALLBACK_FRAME.as_bytes())
        }
    }
}

/// Decode a client frame into an envelope.
pub fn decode(frame: &[u8]) -> Result<IncomingEnvelope, serde_json::Error> {
    serde_json::from_slice(frame)
}

fn meta(chat_id: Option<ChatId>) -> EnvelopeMeta {
    EnvelopeMeta {
        timestamp: Utc::now(),
        event_id: EventId::new(),
        chat_id,
    }
}
