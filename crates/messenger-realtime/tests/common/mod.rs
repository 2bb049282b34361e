//! Shared fakes for delivery engine tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{Sink, StreamExt};

use messenger_core::config::RealtimeConfig;
use messenger_core::error::AppError;
use messenger_core::models::{ChatMember, ChatMessage};
use messenger_core::result::AppResult;
use messenger_core::traits::{MembershipGate, MessageRepository};
use messenger_core::types::{ChatId, MessageId, UserId};
use messenger_realtime::MemoryOfflineStore;
use messenger_realtime::RealtimeEngine;
use messenger_realtime::connection::{Frame, FrameSink, FrameStream, TransportError};

/// In-memory chat directory acting as both membership gate and repository.
#[derive(Default)]
pub struct FakeDirectory {
    members: Mutex<HashMap<ChatId, HashSet<UserId>>>,
    pub saved: Mutex<Vec<ChatMessage>>,
    pub persist_calls: AtomicUsize,
    pub fail_membership: AtomicBool,
    pub fail_members_of: AtomicBool,
    pub fail_persist: AtomicBool,
}

impl FakeDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_member(&self, chat_id: ChatId, user_id: UserId) {
        self.members
            .lock()
            .unwrap()
            .entry(chat_id)
            .or_default()
            .insert(user_id);
    }
}

#[async_trait]
impl MembershipGate for FakeDirectory {
    async fn is_member(&self, user_id: UserId, chat_id: ChatId) -> AppResult<bool> {
        if self.fail_membership.load(Ordering::SeqCst) {
            return Err(AppError::database("membership store unavailable"));
        }
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&chat_id)
            .is_some_and(|m| m.contains(&user_id)))
    }

    async fn members_of(&self, chat_id: ChatId) -> AppResult<Vec<ChatMember>> {
        if self.fail_members_of.load(Ordering::SeqCst) {
            return Err(AppError::database("membership store unavailable"));
        }
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&chat_id)
            .map(|m| m.iter().map(|u| ChatMember::new(chat_id, *u)).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl MessageRepository for FakeDirectory {
    async fn persist(&self, message: &ChatMessage) -> AppResult<MessageId> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(AppError::database("insert failed"));
        }
        let id = MessageId::new();
        self.saved.lock().unwrap().push(message.clone().with_id(id));
        Ok(id)
    }
}

/// Sink that forwards frames to a channel and counts close calls.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<Frame>,
    closes: Arc<AtomicUsize>,
}

impl Sink<Frame> for RecordingSink {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        self.tx
            .unbounded_send(item)
            .map_err(|_| TransportError::Closed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.tx.close_channel();
        Poll::Ready(Ok(()))
    }
}

/// Sink whose peer never reads: every write and close stays pending.
pub struct StalledSink;

impl Sink<Frame> for StalledSink {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Pending
    }

    fn start_send(self: Pin<&mut Self>, _item: Frame) -> Result<(), Self::Error> {
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Pending
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Pending
    }
}

/// Client side of an in-memory connection.
pub struct FakeClient {
    pub inbound: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    pub outbound: mpsc::UnboundedReceiver<Frame>,
    pub closes: Arc<AtomicUsize>,
}

impl FakeClient {
    /// Send a text frame to the server.
    pub fn send_text(&self, text: &str) {
        self.inbound
            .unbounded_send(Ok(Frame::Text(Bytes::from(text.to_string()))))
            .expect("server side gone");
    }

    /// Next text frame from the server, parsed as JSON. Skips pings.
    pub async fn next_json(&mut self) -> serde_json::Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.outbound.next())
                .await
                .expect("timed out waiting for frame")
                .expect("connection closed");
            match frame {
                Frame::Text(data) => return serde_json::from_slice(&data).expect("json frame"),
                Frame::Ping(_) | Frame::Pong(_) => continue,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    /// Collect every frame until the server closes the connection.
    pub async fn frames_until_closed(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.outbound.next().await {
            frames.push(frame);
        }
        frames
    }
}

/// Build a connected in-memory transport.
pub fn transport() -> (FrameSink, FrameStream, FakeClient) {
    let (out_tx, out_rx) = mpsc::unbounded();
    let (in_tx, in_rx) = mpsc::unbounded();
    let closes = Arc::new(AtomicUsize::new(0));
    let sink: FrameSink = Box::pin(RecordingSink {
        tx: out_tx,
        closes: Arc::clone(&closes),
    });
    let stream: FrameStream = Box::pin(in_rx);
    let client = FakeClient {
        inbound: in_tx,
        outbound: out_rx,
        closes,
    };
    (sink, stream, client)
}

/// Transport whose outbound side never drains, with the inbound sender.
pub fn stalled_transport() -> (
    FrameSink,
    FrameStream,
    mpsc::UnboundedSender<Result<Frame, TransportError>>,
) {
    let (in_tx, in_rx) = mpsc::unbounded();
    (Box::pin(StalledSink), Box::pin(in_rx), in_tx)
}

/// Engine over a fake directory and an in-memory offline store.
pub fn engine_with(config: RealtimeConfig, directory: &Arc<FakeDirectory>) -> RealtimeEngine {
    RealtimeEngine::new(
        config,
        directory.clone(),
        directory.clone(),
        Arc::new(MemoryOfflineStore::new()),
    )
}

pub fn engine(directory: &Arc<FakeDirectory>) -> RealtimeEngine {
    engine_with(RealtimeConfig::default(), directory)
}

/// Connect `user_id` and return the serving task with the client end.
pub fn connect(
    engine: &RealtimeEngine,
    user_id: UserId,
) -> (tokio::task::JoinHandle<Result<(), AppError>>, FakeClient) {
    let (sink, stream, client) = transport();
    let engine = engine.clone();
    let task = tokio::spawn(async move { engine.serve(user_id, sink, stream).await });
    (task, client)
}

/// Wait until the hub reports `count` sessions for `user_id`.
pub async fn wait_for_sessions(engine: &RealtimeEngine, user_id: UserId, count: usize) {
    for _ in 0..500 {
        if engine.hub.sessions_of(user_id).len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("user {user_id} never reached {count} sessions");
}

pub fn send_message(chat_id: ChatId, content: &str) -> String {
    serde_json::json!({
        "type": "send_message",
        "chat_id": chat_id,
        "payload": { "content": content },
    })
    .to_string()
}
