//! WebSocket upgrade handler.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use bytes::Bytes;
use futures::{SinkExt, StreamExt, future};
use tracing::{debug, warn};

use messenger_core::error::AppError;
use messenger_core::types::UserId;
use messenger_realtime::connection::{Frame, FrameSink, FrameStream, TransportError};

use crate::error::ApiError;
use crate::extractors::GatewayIdentity;
use crate::state::AppState;

/// GET /ws: WebSocket upgrade for an authenticated user
pub async fn ws_upgrade(
    State(state): State<AppState>,
    GatewayIdentity(user_id): GatewayIdentity,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    if state.realtime.is_shutting_down() {
        return Err(AppError::service_unavailable("Server is shutting down").into());
    }

    let max_message_size = state.realtime.config().max_message_size;
    Ok(ws
        .max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(state, user_id, socket)))
}

async fn handle_socket(state: AppState, user_id: UserId, socket: WebSocket) {
    debug!(user_id = %user_id, "WebSocket upgraded");
    let (sink, stream) = split_socket(socket);
    if let Err(e) = state.realtime.serve(user_id, sink, stream).await {
        warn!(user_id = %user_id, error = %e, "WebSocket session refused");
    }
}

/// Adapt an axum socket to the engine's frame transport.
///
/// Pings from the client are answered by the socket itself.
pub fn split_socket(socket: WebSocket) -> (FrameSink, FrameStream) {
    let (ws_tx, ws_rx) = socket.split();

    let sink: FrameSink = Box::pin(
        ws_tx
            .sink_map_err(|e| TransportError::Io(e.to_string()))
            .with(|frame: Frame| future::ready(Ok::<_, TransportError>(into_message(frame)))),
    );
    let stream: FrameStream = Box::pin(ws_rx.map(|item| {
        item.map(from_message)
            .map_err(|e| TransportError::Io(e.to_string()))
    }));

    (sink, stream)
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(data) => match std::str::from_utf8(&data) {
            Ok(text) => Message::text(text),
            Err(_) => Message::Binary(data),
        },
        Frame::Binary(data) => Message::Binary(data),
        Frame::Ping(data) => Message::Ping(data),
        Frame::Pong(data) => Message::Pong(data),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(Bytes::from(text)),
        Message::Binary(data) => Frame::Binary(data),
        Message::Ping(data) => Frame::Ping(data),
        Message::Pong(data) => Frame::Pong(data),
        Message::Close(_) => Frame::Close,
    }
}
