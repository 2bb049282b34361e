//! Delivery engine metrics.

pub mod connections;
pub mod delivery;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Total sessions registered
    pub connections_total: AtomicU64,
    /// Sessions currently registered
    pub connections_active: AtomicU64,
    /// Text frames read from clients
    pub frames_received: AtomicU64,
    /// Envelopes accepted into a session's outbound queue
    pub envelopes_delivered: AtomicU64,
    /// Envelopes appended to the offline queue
    pub envelopes_queued_offline: AtomicU64,
    /// Offline envelopes replayed on connect
    pub envelopes_replayed: AtomicU64,
    /// Error envelopes sent back to a sender
    pub errors_reported: AtomicU64,
    /// Sessions dropped because their outbound queue was full
    pub sessions_dropped: AtomicU64,
    /// Fan-outs abandoned because membership could not be resolved
    pub fanouts_aborted: AtomicU64,
}

impl EngineMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            envelopes_delivered: self.envelopes_delivered.load(Ordering::Relaxed),
            envelopes_queued_offline: self.envelopes_queued_offline.load(Ordering::Relaxed),
            envelopes_replayed: self.envelopes_replayed.load(Ordering::Relaxed),
            errors_reported: self.errors_reported.load(Ordering::Relaxed),
            sessions_dropped: self.sessions_dropped.load(Ordering::Relaxed),
            fanouts_aborted: self.fanouts_aborted.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total sessions registered
    pub connections_total: u64,
    /// Sessions currently registered
    pub connections_active: u64,
    /// Text frames read from clients
    pub frames_received: u64,
    /// Envelopes accepted into outbound queues
    pub envelopes_delivered: u64,
    /// Envelopes appended to the offline queue
    pub envelopes_queued_offline: u64,
    /// Offline envelopes replayed on connect
    pub envelopes_replayed: u64,
    /// Error envelopes sent back to senders
    pub errors_reported: u64,
    /// Sessions dropped for backpressure
    pub sessions_dropped: u64,
    /// Fan-outs abandoned
    pub fanouts_aborted: u64,
}
