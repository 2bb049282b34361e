//! Core type definitions used across the messenger workspace.

pub mod id;

pub use id::*;
