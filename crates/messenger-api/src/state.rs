//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use messenger_core::config::AppConfig;
use messenger_realtime::RealtimeEngine;

/// Application state passed to every handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Delivery engine
    pub realtime: RealtimeEngine,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create application state.
    pub fn new(config: Arc<AppConfig>, realtime: RealtimeEngine) -> Self {
        Self {
            config,
            realtime,
            started_at: Instant::now(),
        }
    }
}
