//! A single client connection as seen by the delivery engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once, PoisonError};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use messenger_core::types::{SessionId, UserId};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Loops running, queue accepting.
    Active,
    /// Teardown started.
    Closing,
    /// Teardown finished.
    Closed,
}

/// Why an envelope could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The outbound queue is at capacity.
    #[error("Outbound queue full")]
    Full,
    /// The session is closed.
    #[error("Session closed")]
    Closed,
}

/// One live client connection.
///
/// Producers push serialized envelopes with [`Session::try_enqueue`], which
/// never waits. The writer loop owns the receiving half of the queue.
/// [`Session::close`] stops the loops and closes the queue; it is safe to
/// call from any number of tasks and does its work once.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    connected_at: DateTime<Utc>,
    outbound: Mutex<Option<mpsc::Sender<Bytes>>>,
    cancel: CancellationToken,
    closed: AtomicBool,
    teardown: Once,
}

impl Session {
    /// Create a session with an outbound queue of `capacity` envelopes.
    ///
    /// Returns the session and the receiving half of its queue.
    pub fn new(user_id: UserId, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        Self::with_cancellation(user_id, capacity, CancellationToken::new())
    }

    /// Create a session whose loops also stop when `cancel` fires.
    pub fn with_cancellation(
        user_id: UserId,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let session = Arc::new(Self {
            id: SessionId::new(),
            user_id,
            connected_at: Utc::now(),
            outbound: Mutex::new(Some(tx)),
            cancel,
            closed: AtomicBool::new(false),
            teardown: Once::new(),
        });
        (session, rx)
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Owning user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// When the session was created.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Token cancelled when the session starts closing.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether teardown has completed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.is_closed() {
            SessionState::Closed
        } else if self.cancel.is_cancelled() {
            SessionState::Closing
        } else {
            SessionState::Active
        }
    }

    /// Queue a serialized envelope without waiting.
    pub fn try_enqueue(&self, payload: Bytes) -> Result<(), EnqueueError> {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = outbound.as_ref() else {
            return Err(EnqueueError::Closed);
        };
        tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Tear the session down.
    ///
    /// Stops the loops, closes the outbound queue, and marks the session
    /// closed. Returns `true` only for the call that performed the teardown.
    pub fn close(&self) -> bool {
        let mut performed = false;
        self.teardown.call_once(|| {
            self.cancel.cancel();
            self.outbound
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            self.closed.store(true, Ordering::Release);
            performed = true;
        });
        if performed {
            debug!(session_id = %self.id, user_id = %self.user_id, "Session closed");
        }
        performed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_until_full() {
        let (session, mut rx) = Session::new(UserId::new(), 2);
        assert!(session.try_enqueue(Bytes::from_static(b"a")).is_ok());
        assert!(session.try_enqueue(Bytes::from_static(b"b")).is_ok());
        assert_eq!(
            session.try_enqueue(Bytes::from_static(b"c")),
            Err(EnqueueError::Full)
        );
        assert_eq!(rx.try_recv().expect("first"), Bytes::from_static(b"a"));
        assert_eq!(rx.try_recv().expect("second"), Bytes::from_static(b"b"));
    }

    #[test]
    fn test_connected_at_is_stamped_on_creation() {
        let before = Utc::now();
        let (session, _rx) = Session::new(UserId::new(), 1);
        assert!(session.connected_at() >= before);
        assert!(session.connected_at() <= Utc::now());
    }

    #[test]
    fn test_close_runs_once() {
        let (session, _rx) = Session::new(UserId::new(), 4);
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.close());
        assert!(!session.close());
        assert!(session.is_closed());
        assert!(session.cancellation().is_cancelled());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_enqueue_after_close_is_rejected() {
        let (session, mut rx) = Session::new(UserId::new(), 4);
        session.try_enqueue(Bytes::from_static(b"kept")).expect("queued");
        session.close();
        assert_eq!(
            session.try_enqueue(Bytes::from_static(b"late")),
            Err(EnqueueError::Closed)
        );
        // Items queued before teardown remain readable, then the queue ends.
        assert_eq!(rx.try_recv().expect("kept"), Bytes::from_static(b"kept"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_close_exactly_once() {
        let (session, _rx) = Session::new(UserId::new(), 4);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || session.close())
            })
            .collect();
        let performed = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .filter(|performed| *performed)
            .count();
        assert_eq!(performed, 1);
    }

    #[test]
    fn test_parent_cancellation_moves_to_closing() {
        let parent = CancellationToken::new();
        let (session, _rx) = Session::with_cancellation(UserId::new(), 1, parent.child_token());
        parent.cancel();
        assert_eq!(session.state(), SessionState::Closing);
        assert!(!session.is_closed());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (session, _rx) = Session::new(UserId::new(), 0);
        assert!(session.try_enqueue(Bytes::from_static(b"x")).is_ok());
    }
}
