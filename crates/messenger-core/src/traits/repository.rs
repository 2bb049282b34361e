//! Message persistence consumed by the delivery engine.

use async_trait::async_trait;

use crate::models::ChatMessage;
use crate::result::AppResult;
use crate::types::MessageId;

/// Persists chat messages before they are fanned out.
#[async_trait]
pub trait MessageRepository: Send + Sync + 'static {
    /// Store `message` and return the id it was saved under.
    async fn persist(&self, message: &ChatMessage) -> AppResult<MessageId>;
}
