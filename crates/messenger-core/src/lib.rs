//! # messenger-core
//!
//! Core crate for the corporate messenger chat component. Contains the
//! collaborator traits consumed by the real-time delivery engine,
//! configuration schemas, typed identifiers, chat models, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other messenger crates.

pub mod config;
pub mod error;
pub mod models;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
