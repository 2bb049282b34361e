//! Concrete repository implementations.

pub mod chat;
