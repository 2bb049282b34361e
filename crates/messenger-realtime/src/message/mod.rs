//! Envelope types, the envelope codec, and inbound request validation.

pub mod codec;
pub mod types;
pub mod validator;

pub use types::{
    EnvelopeMeta, ErrorCode, ErrorPayload, EventType, IncomingEnvelope, MessageSentPayload,
    OutgoingEnvelope, RequestType, SendMessagePayload,
};
