//! Chat domain models shared between the repository and the delivery engine.

pub mod member;
pub mod message;

pub use member::{ChatMember, MemberRole};
pub use message::{ChatMessage, MessageType};
