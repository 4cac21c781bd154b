//! Relay hub: registration, fan-out and the per-socket loops.

use std::fmt::Display;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, close_code};
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge};
use parlor_core::ConnectionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::RelayConnection;
use super::error::{CloseReason, RelayError};
use super::frame::Frame;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::registry::ConnectionRegistry;
use crate::config::RelayConfig;
use crate::metrics::{
    RELAY_CONNECTIONS_ACTIVE, RELAY_CONNECTIONS_TOTAL, RELAY_DISCONNECTIONS_TOTAL,
    RELAY_EVICTIONS_TOTAL, RELAY_MESSAGES_TOTAL,
};

/// Outcome of fanning out one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Connections the frame was offered to.
    pub recipients: usize,
    /// Connections that accepted the frame.
    pub delivered: usize,
    /// Connections that refused it and were evicted.
    pub failed: usize,
}

/// Fans every inbound frame out to all registered connections.
pub struct RelayHub {
    registry: ConnectionRegistry,
    config: RelayConfig,
    max_connections: usize,
    shutdown: CancellationToken,
}

impl RelayHub {
    /// Create a hub with no connection limit. Cancelling `shutdown` cancels
    /// every connection.
    pub fn new(config: RelayConfig, shutdown: CancellationToken) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            config,
            max_connections: usize::MAX,
            shutdown,
        }
    }

    /// Refuse registrations beyond `max` open connections.
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Connection limit enforced by [`register`](Self::register).
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Hub configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The registry of open connections.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Ids of the registered connections.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.registry.ids()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Register a new connection and return it with the receiving end of
    /// its outbound queue.
    ///
    /// Fails with [`RelayError::AtCapacity`] once the limit is reached, even
    /// when many handshakes race past the pre-upgrade check.
    pub fn register(&self) -> Result<(Arc<RelayConnection>, mpsc::Receiver<Frame>), RelayError> {
        if self.shutdown.is_cancelled() {
            return Err(RelayError::ShuttingDown);
        }
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let conn = Arc::new(RelayConnection::new(
            ConnectionId::new(),
            tx,
            self.shutdown.child_token(),
        ));
        if !self.registry.add_within(Arc::clone(&conn), self.max_connections) {
            return Err(RelayError::AtCapacity {
                limit: self.max_connections,
            });
        }
        counter!(RELAY_CONNECTIONS_TOTAL).increment(1);
        self.record_active();
        info!(conn_id = %conn.id, active = self.registry.len(), "relay connection registered");
        Ok((conn, rx))
    }

    /// Offer `frame` to every registered connection.
    ///
    /// The sender is skipped when echo is disabled. A recipient that cannot
    /// take the frame is evicted; delivery to the rest continues.
    pub fn broadcast(&self, from: &ConnectionId, frame: &Frame) -> FanOut {
        let mut out = FanOut::default();
        for conn in self.registry.snapshot() {
            if !self.config.echo && conn.id == *from {
                continue;
            }
            out.recipients += 1;
            match conn.send(frame.clone()) {
                Ok(()) => out.delivered += 1,
                Err(source) => {
                    out.failed += 1;
                    let err = RelayError::Send {
                        connection: conn.id.clone(),
                        source,
                    };
                    warn!(from = %from, error = %err, "evicting relay recipient");
                    if self.disconnect(&conn.id, CloseReason::from(source)) {
                        counter!(RELAY_EVICTIONS_TOTAL).increment(1);
                    }
                }
            }
        }
        counter!(RELAY_MESSAGES_TOTAL).increment(1);
        debug!(from = %from, bytes = frame.len(), ?out, "frame relayed");
        out
    }

    /// Remove a connection and close it.
    ///
    /// Returns `true` for the call that actually removed it; later calls for
    /// the same id are no-ops.
    pub fn disconnect(&self, id: &ConnectionId, reason: CloseReason) -> bool {
        let Some(conn) = self.registry.remove(id) else {
            return false;
        };
        let _ = conn.close();
        counter!(RELAY_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
        self.record_active();
        info!(
            conn_id = %id,
            reason = reason.as_str(),
            age_ms = u64::try_from(conn.age().as_millis()).unwrap_or(u64::MAX),
            dropped = conn.drop_count(),
            active = self.registry.len(),
            "relay connection removed"
        );
        true
    }

    /// Stop accepting connections and close every open one.
    ///
    /// Returns the number of connections closed.
    pub fn shutdown(&self) -> usize {
        self.shutdown.cancel();
        let drained = self.registry.drain();
        for conn in &drained {
            let _ = conn.close();
            counter!(RELAY_DISCONNECTIONS_TOTAL, "reason" => CloseReason::Shutdown.as_str())
                .increment(1);
        }
        self.record_active();
        info!(closed = drained.len(), "relay hub shut down");
        drained.len()
    }

    /// Serve one upgraded socket until it closes.
    ///
    /// Inbound data frames are relayed through [`broadcast`](Self::broadcast).
    /// Outbound frames are written by a dedicated task so writes to this
    /// socket are strictly sequential.
    pub async fn serve<S, E>(self: Arc<Self>, socket: S)
    where
        S: Stream<Item = Result<Message, E>> + Sink<Message, Error = E> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (mut sink, stream) = socket.split();
        let (conn, rx) = match self.register() {
            Ok(registered) => registered,
            Err(e) => {
                warn!(error = %e, "relay connection refused");
                let code = match e {
                    RelayError::AtCapacity { .. } => close_code::AGAIN,
                    _ => close_code::AWAY,
                };
                let close = Message::Close(Some(CloseFrame {
                    code,
                    reason: e.to_string().into(),
                }));
                let _ = tokio::time::timeout(self.config.write_timeout(), sink.send(close)).await;
                return;
            }
        };
        conn.mark_relaying();

        let writer = tokio::spawn(write_loop(Arc::clone(&self), Arc::clone(&conn), sink, rx));

        let heartbeat = (!self.config.heartbeat_timeout().is_zero()).then(|| {
            let hub = Arc::clone(&self);
            let conn = Arc::clone(&conn);
            tokio::spawn(async move {
                let result = run_heartbeat(
                    Arc::clone(&conn),
                    hub.config.heartbeat_interval(),
                    hub.config.heartbeat_timeout(),
                    conn.cancel_token(),
                )
                .await;
                if result == HeartbeatResult::TimedOut {
                    let _ = hub.disconnect(&conn.id, CloseReason::HeartbeatTimeout);
                }
            })
        });

        let reason = self.read_loop(&conn, stream).await;
        let _ = self.disconnect(&conn.id, reason);

        if let Err(e) = writer.await {
            warn!(conn_id = %conn.id, error = %e, "relay writer task failed");
        }
        if let Some(heartbeat) = heartbeat {
            let _ = heartbeat.await;
        }
        conn.mark_closed();
        debug!(conn_id = %conn.id, "relay connection closed");
    }

    async fn read_loop<R, E>(&self, conn: &RelayConnection, mut stream: R) -> CloseReason
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        loop {
            let next = tokio::select! {
                biased;
                () = conn.cancelled() => {
                    return if self.shutdown.is_cancelled() {
                        CloseReason::Shutdown
                    } else {
                        CloseReason::Evicted
                    };
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => conn.mark_alive(),
                Some(Ok(Message::Close(_))) | None => return CloseReason::ClientClosed,
                Some(Ok(msg)) => {
                    conn.mark_alive();
                    if let Some(frame) = Frame::from_message(msg) {
                        let _ = self.broadcast(&conn.id, &frame);
                    }
                }
                Some(Err(e)) => {
                    let err = RelayError::Receive(e.to_string());
                    warn!(conn_id = %conn.id, error = %err, "relay read failed");
                    return CloseReason::ReceiveFailed;
                }
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_active(&self) {
        gauge!(RELAY_CONNECTIONS_ACTIVE).set(self.registry.len() as f64);
    }
}

/// Drain the outbound queue into the socket, interleaving pings.
///
/// Each write is bounded by the write timeout; a failed or stalled write
/// removes the connection.
async fn write_loop<K>(
    hub: Arc<RelayHub>,
    conn: Arc<RelayConnection>,
    mut sink: K,
    mut rx: mpsc::Receiver<Frame>,
) where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let write_timeout = hub.config.write_timeout();
    let mut ping = tokio::time::interval(hub.config.heartbeat_interval());
    let _ = ping.tick().await;

    let failure = loop {
        let msg = tokio::select! {
            biased;
            () = conn.cancelled() => break None,
            frame = rx.recv() => match frame {
                Some(frame) => frame.into_message(),
                None => break None,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        match tokio::time::timeout(write_timeout, sink.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(conn_id = %conn.id, error = %e, "relay write failed");
                break Some(CloseReason::WriteFailed);
            }
            Err(_) => {
                warn!(
                    conn_id = %conn.id,
                    timeout_secs = write_timeout.as_secs(),
                    "relay write timed out"
                );
                break Some(CloseReason::WriteTimeout);
            }
        }
    };

    match failure {
        Some(reason) => {
            let _ = hub.disconnect(&conn.id, reason);
        }
        None => {
            let _ = tokio::time::timeout(write_timeout, sink.send(Message::Close(None))).await;
        }
    }
    let _ = tokio::time::timeout(write_timeout, sink.close()).await;
}
