//! # messenger-realtime
//!
//! Real-time delivery engine for the corporate messenger. Provides:
//!
//! - Per-connection sessions with reader, writer, and liveness loops
//! - A registry of live sessions keyed by user
//! - Per-user offline buffering with drain-on-connect
//! - Chat fan-out to every member's live sessions
//! - Handling of inbound `send_message` envelopes

pub mod broadcast;
pub mod connection;
pub mod dispatch;
pub mod message;
pub mod metrics;
pub mod offline;
pub mod server;

pub use broadcast::BroadcastCoordinator;
pub use connection::{Hub, Session};
pub use dispatch::InboundDispatcher;
pub use offline::MemoryOfflineStore;
pub use server::RealtimeEngine;
