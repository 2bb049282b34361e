//! Handling of inbound client envelopes.

pub mod dispatcher;

pub use dispatcher::InboundDispatcher;
