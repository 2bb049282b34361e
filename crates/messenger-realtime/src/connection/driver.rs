//! Per-session I/O loops.
//!
//! Every session runs three cooperating loops:
//!
//! - the **reader** pulls frames from the client and hands text frames to
//!   a [`FrameHandler`]; it drops the session when nothing (not even a pong)
//!   arrives within the read deadline
//! - the **writer** drains the outbound queue, batching whatever is already
//!   queued into a single flush, and pings when it has been idle
//! - the **prober** pings on a fixed schedule
//!
//! The first loop to fail closes the session, which stops the other two.
//! Only the writer touches the transport on the way out, so the close frame
//! and the sink shutdown happen exactly once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio::time::{self, Instant};
use tracing::{debug, error, trace, warn};

use messenger_core::config::RealtimeConfig;

use crate::metrics::{EngineMetrics, delivery};

use super::session::Session;
use super::transport::{Frame, FrameSink, FrameStream, TransportError};

/// Receives text frames read from a client.
#[async_trait]
pub trait FrameHandler: Send + Sync + 'static {
    /// Handle one text frame from `session`.
    async fn handle_text(&self, session: &Arc<Session>, frame: Bytes);
}

/// Liveness and write deadlines for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Interval between scheduled pings.
    pub ping_interval: Duration,
    /// Maximum silence from the client before the session is dropped.
    pub pong_wait: Duration,
    /// Deadline for a single write or flush.
    pub write_wait: Duration,
    /// Idle period after which the writer pings.
    pub idle_ping_interval: Duration,
}

impl From<&RealtimeConfig> for SessionTiming {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            pong_wait: config.pong_wait(),
            write_wait: config.write_wait(),
            idle_ping_interval: config.idle_ping_interval(),
        }
    }
}

type SharedSink = Arc<Mutex<FrameSink>>;

/// Runs the I/O loops of a session.
pub struct SessionDriver {
    timing: SessionTiming,
    handler: Arc<dyn FrameHandler>,
    metrics: Arc<EngineMetrics>,
}

impl SessionDriver {
    /// Create a driver.
    pub fn new(
        timing: SessionTiming,
        handler: Arc<dyn FrameHandler>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            timing,
            handler,
            metrics,
        }
    }

    /// Drive `session` over the given transport until it closes.
    ///
    /// `replay` is written to the client before anything from the outbound
    /// queue. Returns once all three loops have finished and the transport
    /// has been closed.
    pub async fn run(
        &self,
        session: Arc<Session>,
        outbox: mpsc::Receiver<Bytes>,
        sink: FrameSink,
        stream: FrameStream,
        replay: Vec<Bytes>,
    ) {
        let sink: SharedSink = Arc::new(Mutex::new(sink));

        let writer = tokio::spawn(write_loop(
            Arc::clone(&session),
            outbox,
            Arc::clone(&sink),
            replay,
            self.timing,
        ));
        let prober = tokio::spawn(probe_loop(
            Arc::clone(&session),
            Arc::clone(&sink),
            self.timing,
        ));

        self.read_loop(&session, stream).await;
        session.close();

        if let Err(e) = writer.await {
            error!(session_id = %session.id(), error = %e, "Writer task failed");
        }
        if let Err(e) = prober.await {
            error!(session_id = %session.id(), error = %e, "Prober task failed");
        }
    }

    async fn read_loop(&self, session: &Arc<Session>, mut stream: FrameStream) {
        let cancel = session.cancellation().clone();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = time::timeout(self.timing.pong_wait, stream.next()) => next,
            };

            let frame = match next {
                Err(_) => {
                    warn!(session_id = %session.id(), "Read deadline expired");
                    break;
                }
                Ok(None) => {
                    debug!(session_id = %session.id(), "Client stream ended");
                    break;
                }
                Ok(Some(Err(e))) => {
                    debug!(session_id = %session.id(), error = %e, "Read failed");
                    break;
                }
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Frame::Text(data) => {
                    delivery::record_frame(&self.metrics);
                    self.handler.handle_text(session, data).await;
                }
                Frame::Pong(_) => trace!(session_id = %session.id(), "Pong received"),
                Frame::Ping(_) => trace!(session_id = %session.id(), "Ping received"),
                Frame::Binary(_) => {
                    debug!(session_id = %session.id(), "Ignoring binary frame");
                }
                Frame::Close => {
                    debug!(session_id = %session.id(), "Client sent close");
                    break;
                }
            }
        }
    }
}

async fn write_loop(
    session: Arc<Session>,
    mut outbox: mpsc::Receiver<Bytes>,
    sink: SharedSink,
    replay: Vec<Bytes>,
    timing: SessionTiming,
) {
    let cancel = session.cancellation().clone();

    let replay_ok = replay.is_empty() || {
        let count = replay.len();
        match write_batch(&sink, replay, timing.write_wait).await {
            Ok(()) => {
                debug!(session_id = %session.id(), count, "Replayed offline envelopes");
                true
            }
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "Offline replay failed");
                false
            }
        }
    };

    if replay_ok {
        let mut idle = time::interval_at(
            Instant::now() + timing.idle_ping_interval,
            timing.idle_ping_interval,
        );
        let mut wrote_since_tick = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = outbox.recv() => {
                    let Some(first) = item else { break };
                    let mut batch = vec![first];
                    while let Ok(next) = outbox.try_recv() {
                        batch.push(next);
                    }
                    if let Err(e) = write_batch(&sink, batch, timing.write_wait).await {
                        warn!(session_id = %session.id(), error = %e, "Write failed");
                        break;
                    }
                    wrote_since_tick = true;
                }
                _ = idle.tick() => {
                    if !wrote_since_tick {
                        if let Err(e) = send_ping(&sink, timing.write_wait).await {
                            warn!(session_id = %session.id(), error = %e, "Idle ping failed");
                            break;
                        }
                    }
                    wrote_since_tick = false;
                }
            }
        }
    }

    session.close();

    let mut sink = sink.lock().await;
    if let Ok(Err(e)) = time::timeout(timing.write_wait, sink.send(Frame::Close)).await {
        trace!(session_id = %session.id(), error = %e, "Close frame not delivered");
    }
    if let Ok(Err(e)) = time::timeout(timing.write_wait, sink.close()).await {
        trace!(session_id = %session.id(), error = %e, "Transport close failed");
    }
    debug!(session_id = %session.id(), "Writer finished");
}

async fn probe_loop(session: Arc<Session>, sink: SharedSink, timing: SessionTiming) {
    let cancel = session.cancellation().clone();
    let mut ticker = time::interval_at(
        Instant::now() + timing.ping_interval,
        timing.ping_interval,
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = send_ping(&sink, timing.write_wait).await {
                    warn!(session_id = %session.id(), error = %e, "Ping failed");
                    session.close();
                    break;
                }
            }
        }
    }
}

/// Write every payload as a text frame and flush once.
async fn write_batch(
    sink: &SharedSink,
    batch: Vec<Bytes>,
    write_wait: Duration,
) -> Result<(), TransportError> {
    let mut sink = sink.lock().await;
    let write = async {
        for payload in batch {
            sink.feed(Frame::Text(payload)).await?;
        }
        sink.flush().await
    };
    time::timeout(write_wait, write)
        .await
        .map_err(|_| TransportError::WriteTimeout)?
}

async fn send_ping(sink: &SharedSink, write_wait: Duration) -> Result<(), TransportError> {
    let stamp = Bytes::from(Utc::now().timestamp().to_string());
    let mut sink = sink.lock().await;
    time::timeout(write_wait, sink.send(Frame::Ping(stamp)))
        .await
        .map_err(|_| TransportError::WriteTimeout)?
}
