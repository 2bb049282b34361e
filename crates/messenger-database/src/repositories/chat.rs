//! Chat repository: message persistence and membership queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use messenger_core::error::{AppError, ErrorKind};
use messenger_core::models::{ChatMember, ChatMessage, MemberRole};
use messenger_core::result::AppResult;
use messenger_core::traits::{MembershipGate, MessageRepository};
use messenger_core::types::{ChatId, MessageId, UserId};

/// Raw `chat_members` row.
type MemberRow = (Uuid, Uuid, String, DateTime<Utc>);

/// Repository over the `messages` and `chat_members` tables.
#[derive(Debug, Clone)]
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    /// Create a new chat repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for ChatRepository {
    async fn persist(&self, message: &ChatMessage) -> AppResult<MessageId> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO messages \
             (message_id, chat_id, sender_id, content, type, reply_to, is_edited, is_deleted, sent_at) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, FALSE, $7) RETURNING message_id",
        )
        .bind(message.id.into_uuid())
        .bind(message.chat_id.into_uuid())
        .bind(message.sender_id.into_uuid())
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(message.reply_to.map(MessageId::into_uuid))
        .bind(message.sent_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save message", e))?;

        Ok(MessageId::from_uuid(id))
    }
}

#[async_trait]
impl MembershipGate for ChatRepository {
    async fn is_member(&self, user_id: UserId, chat_id: ChatId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM chat_members WHERE chat_id = $1 AND user_id = $2)",
        )
        .bind(chat_id.into_uuid())
        .bind(user_id.into_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check membership", e))
    }

    async fn members_of(&self, chat_id: ChatId) -> AppResult<Vec<ChatMember>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT chat_id, user_id, role, joined_at FROM chat_members WHERE chat_id = $1",
        )
        .bind(chat_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list chat members", e))?;

        rows.into_iter().map(member_from_row).collect()
    }
}

fn member_from_row((chat_id, user_id, role, joined_at): MemberRow) -> AppResult<ChatMember> {
    Ok(ChatMember {
        chat_id: ChatId::from_uuid(chat_id),
        user_id: UserId::from_uuid(user_id),
        role: role.parse::<MemberRole>()?,
        joined_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_from_row() {
        let chat = Uuid::new_v4();
        let user = Uuid::new_v4();
        let member = member_from_row((chat, user, "owner".to_string(), Utc::now())).expect("row");
        assert_eq!(member.chat_id.into_uuid(), chat);
        assert_eq!(member.user_id.into_uuid(), user);
        assert_eq!(member.role, MemberRole::Owner);
    }

    #[test]
    fn test_member_from_row_rejects_unknown_role() {
        let row = (Uuid::new_v4(), Uuid::new_v4(), "guest".to_string(), Utc::now());
        assert!(member_from_row(row).is_err());
    }
}
