//! Offline delivery buffer.

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;
use crate::types::UserId;

/// Per-user buffer of serialized envelopes awaiting a reconnect.
///
/// `drain` must hand every buffered entry out exactly once: after it
/// returns, the entries belong to the caller and the buffer for that user
/// is empty.
#[async_trait]
pub trait OfflineStore: Send + Sync + 'static {
    /// Append one serialized envelope for `user_id`.
    async fn enqueue(&self, user_id: UserId, payload: Bytes);

    /// Remove and return everything pending for `user_id`, oldest first.
    async fn drain(&self, user_id: UserId) -> AppResult<Vec<Bytes>>;

    /// Number of entries pending for `user_id`.
    async fn pending(&self, user_id: UserId) -> usize;

    /// Number of entries pending across all users.
    async fn total_pending(&self) -> usize;
}
