//! Transport-neutral WebSocket frames.
//!
//! Sessions talk to a boxed [`Sink`]/[`Stream`] pair so the engine can be
//! driven by an axum socket in production and by channels in tests.

use std::pin::Pin;

use bytes::Bytes;
use futures::{Sink, Stream};
use thiserror::Error;

/// A single WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(Bytes),
    /// Binary frame.
    Binary(Bytes),
    /// Ping control frame.
    Ping(Bytes),
    /// Pong control frame.
    Pong(Bytes),
    /// Close control frame.
    Close,
}

/// Transport failures surfaced to the session loops.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer or the local side closed the connection.
    #[error("Connection closed")]
    Closed,
    /// A write did not complete within the write deadline.
    #[error("Write timed out")]
    WriteTimeout,
    /// The underlying socket reported an error.
    #[error("Transport error: {0}")]
    Io(String),
}

/// Outgoing half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Incoming half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;
