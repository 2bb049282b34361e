//! Membership gate consumed by the delivery engine.

use async_trait::async_trait;

use crate::models::ChatMember;
use crate::result::AppResult;
use crate::types::{ChatId, UserId};

/// Answers chat-membership questions.
///
/// The delivery engine never mutates membership; it only asks whether a
/// sender may post into a chat and who should receive a message.
#[async_trait]
pub trait MembershipGate: Send + Sync + 'static {
    /// Whether `user_id` is a member of `chat_id`.
    async fn is_member(&self, user_id: UserId, chat_id: ChatId) -> AppResult<bool>;

    /// All members of `chat_id`.
    async fn members_of(&self, chat_id: ChatId) -> AppResult<Vec<ChatMember>>;
}
