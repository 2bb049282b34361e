//! In-process offline queue backed by a concurrent map.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use messenger_core::result::AppResult;
use messenger_core::traits::OfflineStore;
use messenger_core::types::UserId;

/// Per-user FIFO of envelopes waiting for the user to reconnect.
///
/// Entries live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryOfflineStore {
    entries: DashMap<UserId, Vec<Bytes>>,
}

impl MemoryOfflineStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfflineStore for MemoryOfflineStore {
    async fn enqueue(&self, user_id: UserId, payload: Bytes) {
        let mut queue = self.entries.entry(user_id).or_default();
        queue.push(payload);
        debug!(user_id = %user_id, pending = queue.len(), "Queued envelope for offline user");
    }

    async fn drain(&self, user_id: UserId) -> AppResult<Vec<Bytes>> {
        Ok(self
            .entries
            .remove(&user_id)
            .map(|(_, queue)| queue)
            .unwrap_or_default())
    }

    async fn pending(&self, user_id: UserId) -> usize {
        self.entries.get(&user_id).map_or(0, |queue| queue.len())
    }

    async fn total_pending(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_drain_returns_in_order_and_empties() {
        let store = MemoryOfflineStore::new();
        let user = UserId::new();
        store.enqueue(user, Bytes::from_static(b"1")).await;
        store.enqueue(user, Bytes::from_static(b"2")).await;
        assert_eq!(store.pending(user).await, 2);

        let drained = store.drain(user).await.expect("drain");
        assert_eq!(drained, vec![Bytes::from_static(b"1"), Bytes::from_static(b"2")]);
        assert!(store.drain(user).await.expect("drain").is_empty());
        assert_eq!(store.pending(user).await, 0);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = MemoryOfflineStore::new();
        let (a, b) = (UserId::new(), UserId::new());
        store.enqueue(a, Bytes::from_static(b"a")).await;
        store.enqueue(b, Bytes::from_static(b"b")).await;

        assert_eq!(store.drain(a).await.expect("drain"), vec![Bytes::from_static(b"a")]);
        assert_eq!(store.pending(b).await, 1);
        assert_eq!(store.total_pending().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enqueue_and_drain_delivers_each_once() {
        let store = Arc::new(MemoryOfflineStore::new());
        let user = UserId::new();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    for i in 0..250 {
                        store.enqueue(user, Bytes::from(format!("{p}-{i}"))).await;
                    }
                })
            })
            .collect();
        let drainers: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    for _ in 0..50 {
                        seen.extend(store.drain(user).await.expect("drain"));
                        tokio::task::yield_now().await;
                    }
                    seen
                })
            })
            .collect();

        for p in producers {
            p.await.expect("producer");
        }
        let mut seen = Vec::new();
        for d in drainers {
            seen.extend(d.await.expect("drainer"));
        }
        seen.extend(store.drain(user).await.expect("final drain"));

        let unique: HashSet<_> = seen.iter().cloned().collect();
        assert_eq!(seen.len(), 1000);
        assert_eq!(unique.len(), 1000);
    }
}
