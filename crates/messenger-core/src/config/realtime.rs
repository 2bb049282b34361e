//! Real-time WebSocket engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each session's outbound queue. A full queue disconnects the session.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer_size: usize,
    /// Interval between liveness probes (WebSocket pings) in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Read deadline in seconds; refreshed by every inbound frame including pongs.
    #[serde(default = "default_pong_wait")]
    pub pong_wait_seconds: u64,
    /// Upper bound for a single transport write in seconds.
    #[serde(default = "default_write_wait")]
    pub write_wait_seconds: u64,
    /// Writer idle timer in seconds; must be longer than the probe interval.
    #[serde(default = "default_idle_ping_interval")]
    pub idle_ping_interval_seconds: u64,
    /// Maximum inbound frame size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Timeout for handling one inbound request (membership + persistence).
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_seconds: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_buffer_size: default_outbound_buffer(),
            ping_interval_seconds: default_ping_interval(),
            pong_wait_seconds: default_pong_wait(),
            write_wait_seconds: default_write_wait(),
            idle_ping_interval_seconds: default_idle_ping_interval(),
            max_message_size: default_max_message_size(),
            handler_timeout_seconds: default_handler_timeout(),
        }
    }
}

impl RealtimeConfig {
    /// Reject timer combinations the session driver cannot honour.
    ///
    /// The probe needs a non-zero period, the read deadline has to outlive
    /// one probe round trip and the writer's idle timer must fire less often
    /// than the probe.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.outbound_buffer_size == 0 {
            return Err(AppError::configuration(
                "realtime.outbound_buffer_size must be greater than zero",
            ));
        }
        if self.ping_interval_seconds == 0 {
            return Err(AppError::configuration(
                "realtime.ping_interval_seconds must be greater than zero",
            ));
        }
        if self.pong_wait_seconds <= self.ping_interval_seconds {
            return Err(AppError::configuration(format!(
                "realtime.pong_wait_seconds ({}) must exceed ping_interval_seconds ({})",
                self.pong_wait_seconds, self.ping_interval_seconds
            )));
        }
        if self.idle_ping_interval_seconds <= self.ping_interval_seconds {
            return Err(AppError::configuration(format!(
                "realtime.idle_ping_interval_seconds ({}) must exceed ping_interval_seconds ({})",
                self.idle_ping_interval_seconds, self.ping_interval_seconds
            )));
        }
        Ok(())
    }

    /// Probe interval as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_seconds)
    }

    /// Read deadline as a [`Duration`].
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_seconds)
    }

    /// Write deadline as a [`Duration`].
    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_seconds)
    }

    /// Writer idle timer as a [`Duration`].
    pub fn idle_ping_interval(&self) -> Duration {
        Duration::from_secs(self.idle_ping_interval_seconds)
    }

    /// Request handling timeout as a [`Duration`].
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_seconds)
    }
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    25
}

fn default_pong_wait() -> u64 {
    60
}

fn default_write_wait() -> u64 {
    10
}

fn default_idle_ping_interval() -> u64 {
    50
}

fn default_max_message_size() -> usize {
    1_048_576
}

fn default_handler_timeout() -> u64 {
    10
}
