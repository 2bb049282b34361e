//! # messenger-api
//!
//! HTTP layer for the corporate messenger chat component built on Axum.
//!
//! Provides the WebSocket upgrade endpoint, the gateway identity extractor,
//! health endpoints, request logging, and error mapping.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
