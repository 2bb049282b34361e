//! Top-level delivery engine that ties together all subsystems.

use std::sync::Arc;

use chrono::Utc;
use futures::SinkExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use messenger_core::config::RealtimeConfig;
use messenger_core::error::AppError;
use messenger_core::traits::{MembershipGate, MessageRepository, OfflineStore};
use messenger_core::types::UserId;

use crate::broadcast::BroadcastCoordinator;
use crate::connection::{FrameSink, FrameStream, Hub, Session, SessionDriver, SessionTiming};
use crate::dispatch::InboundDispatcher;
use crate::metrics::{EngineMetrics, delivery};

/// Summary of a completed shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Sessions closed by the shutdown.
    pub sessions_closed: usize,
    /// Offline envelopes still buffered, lost with the process.
    pub offline_pending: usize,
}

/// Central delivery engine.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Live session registry.
    pub hub: Arc<Hub>,
    /// Fan-out coordinator.
    pub coordinator: Arc<BroadcastCoordinator>,
    /// Inbound frame dispatcher.
    pub dispatcher: Arc<InboundDispatcher>,
    /// Offline buffer.
    pub offline: Arc<dyn OfflineStore>,
    /// Metrics collector.
    pub metrics: Arc<EngineMetrics>,
    driver: Arc<SessionDriver>,
    config: RealtimeConfig,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("connections", &self.hub.connection_count())
            .finish()
    }
}

impl RealtimeEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        config: RealtimeConfig,
        gate: Arc<dyn MembershipGate>,
        repository: Arc<dyn MessageRepository>,
        offline: Arc<dyn OfflineStore>,
    ) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let hub = Arc::new(Hub::new(Arc::clone(&metrics)));
        let coordinator = Arc::new(BroadcastCoordinator::new(
            Arc::clone(&hub),
            Arc::clone(&gate),
            Arc::clone(&offline),
            Arc::clone(&metrics),
            config.handler_timeout(),
        ));
        let dispatcher = Arc::new(InboundDispatcher::new(
            Arc::clone(&hub),
            gate,
            repository,
            Arc::clone(&coordinator),
            Arc::clone(&metrics),
            config.handler_timeout(),
        ));
        let driver = Arc::new(SessionDriver::new(
            SessionTiming::from(&config),
            dispatcher.clone(),
            Arc::clone(&metrics),
        ));

        info!(
            outbound_buffer_size = config.outbound_buffer_size,
            ping_interval_seconds = config.ping_interval_seconds,
            pong_wait_seconds = config.pong_wait_seconds,
            "Delivery engine initialized"
        );

        Self {
            hub,
            coordinator,
            dispatcher,
            offline,
            metrics,
            driver,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Whether [`RealtimeEngine::shutdown`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Serve one authenticated connection until it closes.
    ///
    /// The session is registered before the offline queue is drained, so
    /// anything fanned out in between lands in the live queue rather than
    /// being stranded offline. Drained envelopes are written ahead of the
    /// live queue.
    ///
    /// The session leaves the hub as soon as it starts closing, without
    /// waiting for the writer to flush its close frame.
    pub async fn serve(
        &self,
        user_id: UserId,
        mut sink: FrameSink,
        stream: FrameStream,
    ) -> Result<(), AppError> {
        if self.is_shutting_down() {
            if let Err(e) = sink.close().await {
                trace!(user_id = %user_id, error = %e, "Transport close failed");
            }
            return Err(AppError::service_unavailable("Server is shutting down"));
        }

        let (session, outbox) = Session::with_cancellation(
            user_id,
            self.config.outbound_buffer_size,
            self.shutdown.child_token(),
        );
        self.hub.register(Arc::clone(&session));

        let replay = match self.offline.drain(user_id).await {
            Ok(replay) => replay,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to drain offline queue");
                Vec::new()
            }
        };
        if !replay.is_empty() {
            delivery::record_replayed(&self.metrics, replay.len());
        }

        info!(
            user_id = %user_id,
            session_id = %session.id(),
            replayed = replay.len(),
            "Client connected"
        );

        let run = self
            .driver
            .run(Arc::clone(&session), outbox, sink, stream, replay);
        let evict = async {
            session.cancellation().cancelled().await;
            self.hub.unregister(user_id, session.id());
        };
        tokio::join!(run, evict);
        self.hub.unregister(user_id, session.id());

        info!(
            user_id = %user_id,
            session_id = %session.id(),
            connected_seconds = (Utc::now() - session.connected_at()).num_seconds(),
            "Client disconnected"
        );
        Ok(())
    }

    /// Stop accepting connections and close every session.
    pub async fn shutdown(&self) -> ShutdownReport {
        info!("Shutting down delivery engine");
        // Drain the hub before cancelling so the per-session evict watchers
        // find nothing left to count.
        let sessions_closed = self.hub.close_all();
        self.shutdown.cancel();
        let offline_pending = self.offline.total_pending().await;
        if offline_pending > 0 {
            warn!(offline_pending, "Discarding undelivered offline envelopes");
        }

        info!(sessions_closed, "Delivery engine shut down");
        ShutdownReport {
            sessions_closed,
            offline_pending,
        }
    }
}
