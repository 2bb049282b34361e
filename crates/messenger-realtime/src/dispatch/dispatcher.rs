//! Routes inbound frames to request handlers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time;
use tracing::{debug, error, info, warn};

use messenger_core::error::AppError;
use messenger_core::models::ChatMessage;
use messenger_core::result::AppResult;
use messenger_core::traits::{MembershipGate, MessageRepository};

use crate::broadcast::BroadcastCoordinator;
use crate::connection::{FrameHandler, Hub, Session};
use crate::message::codec;
use crate::message::validator::{self, Rejection};
use crate::message::{ErrorCode, IncomingEnvelope, RequestType, SendMessagePayload};
use crate::metrics::{EngineMetrics, delivery};

/// Handles frames read from client sessions.
///
/// Failures are reported only to the session that sent the frame.
pub struct InboundDispatcher {
    hub: Arc<Hub>,
    gate: Arc<dyn MembershipGate>,
    repository: Arc<dyn MessageRepository>,
    coordinator: Arc<BroadcastCoordinator>,
    metrics: Arc<EngineMetrics>,
    handler_timeout: Duration,
}

impl InboundDispatcher {
    /// Create a dispatcher.
    pub fn new(
        hub: Arc<Hub>,
        gate: Arc<dyn MembershipGate>,
        repository: Arc<dyn MessageRepository>,
        coordinator: Arc<BroadcastCoordinator>,
        metrics: Arc<EngineMetrics>,
        handler_timeout: Duration,
    ) -> Self {
        Self {
            hub,
            gate,
            repository,
            coordinator,
            metrics,
            handler_timeout,
        }
    }

    /// Handle one raw text frame from `session`.
    pub async fn dispatch(&self, session: &Session, frame: &[u8]) {
        let envelope = match codec::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(session_id = %session.id(), error = %e, "Undecodable frame");
                self.reply_error(
                    session,
                    ErrorCode::InvalidMessageFormat,
                    "Invalid message format",
                    Some(e.to_string()),
                );
                return;
            }
        };

        match envelope.request_type() {
            Some(RequestType::SendMessage) => self.handle_send_message(session, envelope).await,
            None => {
                debug!(session_id = %session.id(), kind = %envelope.kind, "Unsupported request type");
                self.reply_error(
                    session,
                    ErrorCode::InvalidMessageType,
                    format!("Unsupported message type '{}'", envelope.kind),
                    None,
                );
            }
        }
    }

    async fn handle_send_message(&self, session: &Session, envelope: IncomingEnvelope) {
        let payload: SendMessagePayload = match serde_json::from_value(envelope.payload) {
            Ok(payload) => payload,
            Err(e) => {
                self.reply_error(
                    session,
                    ErrorCode::InvalidPayload,
                    "Invalid request format",
                    Some(e.to_string()),
                );
                return;
            }
        };

        let request = match validator::validate_send(envelope.chat_id, payload) {
            Ok(request) => request,
            Err(Rejection { code, message }) => {
                self.reply_error(session, code, message, None);
                return;
            }
        };

        let sender = session.user_id();
        match self
            .bounded(self.gate.is_member(sender, request.chat_id))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(user_id = %sender, chat_id = %request.chat_id, "Sender is not a chat member");
                self.reply_error(session, ErrorCode::AccessDenied, "Access denied", None);
                return;
            }
            Err(e) => {
                error!(user_id = %sender, chat_id = %request.chat_id, error = %e, "Membership check failed");
                self.reply_error(session, ErrorCode::AccessDenied, "Access denied", None);
                return;
            }
        }

        let message = ChatMessage::new(
            request.chat_id,
            sender,
            request.content,
            request.message_type,
            request.reply_to,
        );
        let saved_id = match self.bounded(self.repository.persist(&message)).await {
            Ok(id) => id,
            Err(e) => {
                error!(user_id = %sender, chat_id = %request.chat_id, error = %e, "Failed to save message");
                self.reply_error(session, ErrorCode::SaveFailed, "Failed to save message", None);
                return;
            }
        };
        let message = message.with_id(saved_id);

        info!(
            message_id = %message.id,
            chat_id = %message.chat_id,
            sender_id = %sender,
            "Message accepted"
        );

        let event = codec::message_sent(&message);
        self.coordinator.broadcast(message.chat_id, &event).await;
    }

    async fn bounded<T>(&self, call: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        time::timeout(self.handler_timeout, call)
            .await
            .unwrap_or_else(|_| Err(AppError::service_unavailable("Request timed out")))
    }

    fn reply_error(
        &self,
        session: &Session,
        code: ErrorCode,
        message: impl Into<String>,
        details: Option<String>,
    ) {
        let envelope = codec::error_envelope(code, message, details);
        delivery::record_error(&self.metrics);
        if let Err(e) = self.hub.deliver(session, codec::encode(&envelope)) {
            debug!(session_id = %session.id(), error = %e, "Error reply not queued");
        }
    }
}

#[async_trait]
impl FrameHandler for InboundDispatcher {
    async fn handle_text(&self, session: &Arc<Session>, frame: Bytes) {
        self.dispatch(session, &frame).await;
    }
}
