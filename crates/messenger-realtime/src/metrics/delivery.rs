//! Delivery metrics helpers.

use std::sync::atomic::Ordering;

use super::EngineMetrics;

/// Record an inbound text frame
pub fn record_frame(metrics: &EngineMetrics) {
    metrics.frames_received.fetch_add(1, Ordering::Relaxed);
}

/// Record an envelope accepted by a live session
pub fn record_delivered(metrics: &EngineMetrics) {
    metrics.envelopes_delivered.fetch_add(1, Ordering::Relaxed);
}

/// Record an envelope parked for an offline member
pub fn record_offline(metrics: &EngineMetrics) {
    metrics.envelopes_queued_offline.fetch_add(1, Ordering::Relaxed);
}

/// Record offline envelopes replayed on connect
pub fn record_replayed(metrics: &EngineMetrics, count: usize) {
    metrics
        .envelopes_replayed
        .fetch_add(count as u64, Ordering::Relaxed);
}

/// Record an error envelope sent back to a sender
pub fn record_error(metrics: &EngineMetrics) {
    metrics.errors_reported.fetch_add(1, Ordering::Relaxed);
}

/// Record a fan-out that could not resolve its recipients
pub fn record_aborted(metrics: &EngineMetrics) {
    metrics.fanouts_aborted.fetch_add(1, Ordering::Relaxed);
}
