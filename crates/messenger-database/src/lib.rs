//! # messenger-database
//!
//! PostgreSQL connection management and the chat repository backing the
//! membership and persistence interfaces of the delivery engine.

pub mod connection;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::chat::ChatRepository;
