//! Delivers a chat event to every member of the chat.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time;
use tracing::{debug, error};

use messenger_core::error::AppError;
use messenger_core::traits::{MembershipGate, OfflineStore};
use messenger_core::types::ChatId;

use crate::connection::{EnqueueError, Hub};
use crate::message::OutgoingEnvelope;
use crate::message::codec;
use crate::metrics::{EngineMetrics, delivery};

/// Outcome of a single fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutReport {
    /// Members the chat resolved to.
    pub members: usize,
    /// Envelopes accepted by live sessions.
    pub delivered: usize,
    /// Sessions evicted because their queue was full or closed.
    pub dropped: usize,
    /// Members whose copy went to the offline queue, either because they had
    /// no session or because every session was already closing.
    pub queued_offline: usize,
    /// Whether membership could not be resolved.
    pub aborted: bool,
}

/// Fans chat events out to live sessions and the offline queue.
pub struct BroadcastCoordinator {
    hub: Arc<Hub>,
    gate: Arc<dyn MembershipGate>,
    offline: Arc<dyn OfflineStore>,
    metrics: Arc<EngineMetrics>,
    lookup_timeout: Duration,
}

impl BroadcastCoordinator {
    /// Create a coordinator.
    pub fn new(
        hub: Arc<Hub>,
        gate: Arc<dyn MembershipGate>,
        offline: Arc<dyn OfflineStore>,
        metrics: Arc<EngineMetrics>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            hub,
            gate,
            offline,
            metrics,
            lookup_timeout,
        }
    }

    /// Deliver `envelope` to every member of `chat_id`.
    ///
    /// The envelope is encoded once. Members with live sessions get a copy
    /// in each session's queue; members without any are served from the
    /// offline queue on their next connect. A member whose sessions all turn
    /// out to be closed counts as offline. If the member list cannot be
    /// resolved nothing is delivered.
    pub async fn broadcast(&self, chat_id: ChatId, envelope: &OutgoingEnvelope) -> FanoutReport {
        let lookup = time::timeout(self.lookup_timeout, self.gate.members_of(chat_id))
            .await
            .unwrap_or_else(|_| Err(AppError::service_unavailable("Membership lookup timed out")));

        let members = match lookup {
            Ok(members) => members,
            Err(e) => {
                error!(chat_id = %chat_id, error = %e, "Failed to resolve chat members, fan-out aborted");
                delivery::record_aborted(&self.metrics);
                return FanoutReport {
                    aborted: true,
                    ..FanoutReport::default()
                };
            }
        };

        let payload = codec::encode(envelope);
        let mut report = FanoutReport {
            members: members.len(),
            ..FanoutReport::default()
        };

        for member in members {
            let mut accepted = 0;
            let mut overflowed = false;
            for session in self.hub.sessions_of(member.user_id) {
                match self.hub.deliver(&session, payload.clone()) {
                    Ok(()) => accepted += 1,
                    Err(EnqueueError::Full) => {
                        overflowed = true;
                        report.dropped += 1;
                    }
                    Err(EnqueueError::Closed) => report.dropped += 1,
                }
            }
            report.delivered += accepted;

            // A slow consumer was live when the envelope arrived and is
            // dropped along with it.
            if accepted == 0 && !overflowed {
                self.offline.enqueue(member.user_id, payload.clone()).await;
                delivery::record_offline(&self.metrics);
                report.queued_offline += 1;
            }
        }

        debug!(
            chat_id = %chat_id,
            members = report.members,
            delivered = report.delivered,
            queued_offline = report.queued_offline,
            dropped = report.dropped,
            "Fan-out complete"
        );
        report
    }
}
