//! Relay error types.

use parlor_core::ConnectionId;

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The outbound queue is at capacity.
    #[error("send queue full")]
    QueueFull,
    /// The connection is closing or its writer has exited.
    #[error("connection closed")]
    Closed,
}

/// Errors surfaced by the relay hub.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The hub no longer accepts connections.
    #[error("relay hub is shutting down")]
    ShuttingDown,
    /// The hub already holds its maximum number of connections.
    #[error("relay hub is full ({limit} connections)")]
    AtCapacity {
        /// Configured connection limit.
        limit: usize,
    },
    /// The HTTP to `WebSocket` upgrade failed.
    #[error("websocket upgrade failed: {0}")]
    Upgrade(String),
    /// Reading from a socket failed.
    #[error("receive failed: {0}")]
    Receive(String),
    /// Queuing a frame for a recipient failed.
    #[error("send to {connection} failed: {source}")]
    Send {
        /// Recipient that could not be reached.
        connection: ConnectionId,
        /// Underlying cause.
        #[source]
        source: SendError,
    },
}

/// Why a connection left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent a close frame or the stream ended.
    ClientClosed,
    /// Reading from the socket failed.
    ReceiveFailed,
    /// The outbound queue was closed when a frame was fanned out.
    SendFailed,
    /// The outbound queue was full when a frame was fanned out.
    SlowConsumer,
    /// Writing to the socket failed.
    WriteFailed,
    /// A socket write did not finish within the write timeout.
    WriteTimeout,
    /// No pong or inbound frame within the heartbeat timeout.
    HeartbeatTimeout,
    /// The connection was cancelled after another path removed it.
    Evicted,
    /// The hub shut down.
    Shutdown,
}

impl CloseReason {
    /// Stable label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::ReceiveFailed => "receive_failed",
            Self::SendFailed => "send_failed",
            Self::SlowConsumer => "slow_consumer",
            Self::WriteFailed => "write_failed",
            Self::WriteTimeout => "write_timeout",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::Evicted => "evicted",
            Self::Shutdown => "shutdown",
        }
    }
}

impl From<SendError> for CloseReason {
    fn from(err: SendError) -> Self {
        match err {
            SendError::QueueFull => Self::SlowConsumer,
            SendError::Closed => Self::SendFailed,
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_error_maps_to_close_reason() {
        assert_eq!(CloseReason::from(SendError::QueueFull), CloseReason::SlowConsumer);
        assert_eq!(CloseReason::from(SendError::Closed), CloseReason::SendFailed);
    }

    #[test]
    fn relay_error_display_names_recipient() {
        let err = RelayError::Send {
            connection: ConnectionId::from_raw("conn_b"),
            source: SendError::QueueFull,
        };
        assert_eq!(err.to_string(), "send to conn_b failed: send queue full");
    }

    #[test]
    fn close_reason_labels_are_snake_case() {
        let all = [
            CloseReason::ClientClosed,
            CloseReason::ReceiveFailed,
            CloseReason::SendFailed,
            CloseReason::SlowConsumer,
            CloseReason::WriteFailed,
            CloseReason::WriteTimeout,
            CloseReason::HeartbeatTimeout,
            CloseReason::Evicted,
            CloseReason::Shutdown,
        ];
        for reason in all {
            let label = reason.as_str();
            assert!(label.chars().all(|c| c.is_ascii_lowercase() || c == '_'), "{label}");
            assert_eq!(reason.to_string(), label);
        }
    }
}
