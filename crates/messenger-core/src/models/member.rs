//! Chat membership model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::{ChatId, UserId};

/// Role of a member inside a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Created the chat.
    Owner,
    /// Can manage members.
    Admin,
    /// Regular participant.
    #[default]
    Member,
}

impl MemberRole {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            _ => Err(AppError::validation(format!(
                "Invalid member role: '{s}'. Expected one of: owner, admin, member"
            ))),
        }
    }
}

/// One member of a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMember {
    /// Chat the membership belongs to.
    pub chat_id: ChatId,
    /// The member.
    pub user_id: UserId,
    /// Role inside the chat.
    pub role: MemberRole,
    /// When the user joined.
    pub joined_at: DateTime<Utc>,
}

impl ChatMember {
    /// Create a regular member that joined now.
    pub fn new(chat_id: ChatId, user_id: UserId) -> Self {
        Self {
            chat_id,
            user_id,
            role: MemberRole::Member,
            joined_at: Utc::now(),
        }
    }
}
