//! Chat fan-out.

pub mod coordinator;

pub use coordinator::{BroadcastCoordinator, FanoutReport};
