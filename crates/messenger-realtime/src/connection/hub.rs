//! Registry of live sessions keyed by user.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{debug, info, warn};

use messenger_core::types::{SessionId, UserId};

use crate::metrics::{EngineMetrics, connections, delivery};

use super::session::{EnqueueError, Session};

type SessionMap = HashMap<UserId, Vec<Arc<Session>>>;

/// Tracks every live session.
///
/// All mutations happen under a single lock that is never held across an
/// await point or a transport operation. Session teardown always runs after
/// the lock is released.
#[derive(Debug)]
pub struct Hub {
    sessions: Mutex<SessionMap>,
    metrics: Arc<EngineMetrics>,
}

impl Hub {
    /// Create an empty hub.
    pub fn new(metrics: Arc<EngineMetrics>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    fn map(&self) -> MutexGuard<'_, SessionMap> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a session to its user's set.
    ///
    /// Closed sessions and sessions already present are ignored. Returns
    /// whether the session was added.
    pub fn register(&self, session: Arc<Session>) -> bool {
        let user_id = session.user_id();
        let session_id = session.id();
        let mut map = self.map();

        if session.is_closed() {
            warn!(user_id = %user_id, session_id = %session_id, "Refusing to register closed session");
            return false;
        }

        let entry = map.entry(user_id).or_default();
        if entry.iter().any(|s| s.id() == session_id) {
            warn!(user_id = %user_id, session_id = %session_id, "Session already registered");
            return false;
        }
        entry.push(session);
        let user_sessions = entry.len();
        drop(map);

        connections::record_connect(&self.metrics);
        info!(
            user_id = %user_id,
            session_id = %session_id,
            user_sessions,
            "Session registered"
        );
        true
    }

    /// Remove a session and tear it down.
    ///
    /// Unknown sessions are ignored. The user's entry disappears with its
    /// last session. Returns whether the session was removed.
    pub fn unregister(&self, user_id: UserId, session_id: SessionId) -> bool {
        let removed = {
            let mut map = self.map();
            let Some(list) = map.get_mut(&user_id) else {
                return false;
            };
            let removed = list
                .iter()
                .position(|s| s.id() == session_id)
                .map(|idx| list.swap_remove(idx));
            if list.is_empty() {
                map.remove(&user_id);
            }
            removed
        };

        let Some(session) = removed else {
            return false;
        };
        session.close();
        connections::record_disconnect(&self.metrics);
        info!(user_id = %user_id, session_id = %session_id, "Session unregistered");
        true
    }

    /// Snapshot of a user's live sessions.
    pub fn sessions_of(&self, user_id: UserId) -> Vec<Arc<Session>> {
        self.map().get(&user_id).cloned().unwrap_or_default()
    }

    /// Whether the user has at least one live session.
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.map().contains_key(&user_id)
    }

    /// Push an envelope to one session.
    ///
    /// A full or closed queue evicts the session instead of waiting. The
    /// error tells the caller which of the two happened.
    pub fn deliver(&self, session: &Session, payload: Bytes) -> Result<(), EnqueueError> {
        match session.try_enqueue(payload) {
            Ok(()) => {
                delivery::record_delivered(&self.metrics);
                Ok(())
            }
            Err(EnqueueError::Full) => {
                warn!(
                    user_id = %session.user_id(),
                    session_id = %session.id(),
                    "Outbound queue full, dropping session"
                );
                connections::record_dropped(&self.metrics);
                self.unregister(session.user_id(), session.id());
                Err(EnqueueError::Full)
            }
            Err(EnqueueError::Closed) => {
                debug!(session_id = %session.id(), "Delivery to closed session skipped");
                self.unregister(session.user_id(), session.id());
                Err(EnqueueError::Closed)
            }
        }
    }

    /// Total live sessions.
    pub fn connection_count(&self) -> usize {
        self.map().values().map(Vec::len).sum()
    }

    /// Users with at least one live session.
    pub fn user_count(&self) -> usize {
        self.map().len()
    }

    /// Remove and tear down every session. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = self.map().drain().flat_map(|(_, list)| list).collect();
        for session in &drained {
            session.close();
            connections::record_disconnect(&self.metrics);
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "Closed all sessions");
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub() -> Hub {
        Hub::new(Arc::new(EngineMetrics::new()))
    }

    #[test]
    fn test_register_and_unregister() {
        let hub = hub();
        let user = UserId::new();
        let sessions: Vec<_> = (0..3).map(|_| Session::new(user, 4).0).collect();
        for s in &sessions {
            assert!(hub.register(Arc::clone(s)));
        }
        assert_eq!(hub.sessions_of(user).len(), 3);

        assert!(hub.unregister(user, sessions[1].id()));
        let remaining = hub.sessions_of(user);
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|s| s.id() != sessions[1].id()));
        assert!(sessions[1].is_closed());
        assert!(!sessions[0].is_closed());
    }

    #[test]
    fn test_last_unregister_removes_user() {
        let hub = hub();
        let user = UserId::new();
        let (session, _rx) = Session::new(user, 4);
        hub.register(Arc::clone(&session));
        assert!(hub.is_online(user));

        hub.unregister(user, session.id());
        assert!(!hub.is_online(user));
        assert_eq!(hub.user_count(), 0);
        assert!(hub.sessions_of(user).is_empty());
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let hub = hub();
        assert!(!hub.unregister(UserId::new(), SessionId::new()));
    }

    #[test]
    fn test_register_ignores_closed_and_duplicates() {
        let hub = hub();
        let user = UserId::new();
        let (closed, _rx1) = Session::new(user, 4);
        closed.close();
        assert!(!hub.register(closed));

        let (session, _rx2) = Session::new(user, 4);
        assert!(hub.register(Arc::clone(&session)));
        assert!(!hub.register(session));
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_deliver_full_queue_drops_session() {
        let metrics = Arc::new(EngineMetrics::new());
        let hub = Hub::new(Arc::clone(&metrics));
        let user = UserId::new();
        let (session, _rx) = Session::new(user, 1);
        hub.register(Arc::clone(&session));

        assert!(hub.deliver(&session, Bytes::from_static(b"1")).is_ok());
        assert_eq!(
            hub.deliver(&session, Bytes::from_static(b"2")),
            Err(EnqueueError::Full)
        );
        assert!(session.is_closed());
        assert!(!hub.is_online(user));
        assert_eq!(metrics.snapshot().sessions_dropped, 1);
        assert_eq!(metrics.snapshot().connections_active, 0);
    }

    #[test]
    fn test_deliver_to_closed_session_evicts_it() {
        let hub = hub();
        let user = UserId::new();
        let (session, _rx) = Session::new(user, 4);
        hub.register(Arc::clone(&session));
        session.close();
        assert!(hub.is_online(user));

        assert_eq!(
            hub.deliver(&session, Bytes::from_static(b"late")),
            Err(EnqueueError::Closed)
        );
        assert!(!hub.is_online(user));
    }

    #[test]
    fn test_close_all() {
        let hub = hub();
        let a = Session::new(UserId::new(), 4).0;
        let b = Session::new(UserId::new(), 4).0;
        hub.register(Arc::clone(&a));
        hub.register(Arc::clone(&b));

        assert_eq!(hub.close_all(), 2);
        assert!(a.is_closed() && b.is_closed());
        assert_eq!(hub.connection_count(), 0);
    }
}
