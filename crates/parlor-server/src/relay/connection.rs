//! Relay connection state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use parlor_core::ConnectionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::SendError;
use super::frame::Frame;

/// Lifecycle of a relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// In the registry, loops not started yet.
    Registered,
    /// Read and write loops running.
    Relaying,
    /// Close requested, loops winding down.
    Closing,
    /// Loops finished, socket released.
    Closed,
}

/// One upgraded relay socket, as seen by the hub.
///
/// Frames are queued with [`send`](Self::send) and written by the single
/// writer task that owns the receiving end of the queue.
pub struct RelayConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    tx: mpsc::Sender<Frame>,
    state: Mutex<ConnectionState>,
    closed: AtomicBool,
    cancel: CancellationToken,
    /// When this connection was registered.
    pub connected_at: Instant,
    /// Whether anything was heard from the peer since the last heartbeat tick.
    pub is_alive: AtomicBool,
    /// Frames refused because the queue was full or closed.
    pub dropped_frames: AtomicU64,
}

impl RelayConnection {
    /// Create a connection writing into `tx`, cancelled by `cancel`.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Frame>, cancel: CancellationToken) -> Self {
        Self {
            id,
            tx,
            state: Mutex::new(ConnectionState::Registered),
            closed: AtomicBool::new(false),
            cancel,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Queue a frame for the writer task without waiting.
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        if self.is_closing() {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            return Err(SendError::Closed);
        }
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                Err(SendError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                Err(SendError::Closed)
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Move from `Registered` to `Relaying`. No-op in any other state.
    pub fn mark_relaying(&self) {
        let mut state = self.state.lock();
        if *state == ConnectionState::Registered {
            *state = ConnectionState::Relaying;
        }
    }

    /// Request close: cancel the loops and refuse further frames.
    ///
    /// Returns `true` only for the call that initiated the close.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Closed {
                *state = ConnectionState::Closing;
            }
        }
        self.cancel.cancel();
        true
    }

    /// Record that both loops have exited.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
        *self.state.lock() = ConnectionState::Closed;
        self.cancel.cancel();
    }

    /// Whether close has been requested.
    pub fn is_closing(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Token cancelled when the connection closes or the hub shuts down.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves once the connection is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Mark the peer as alive (pong or data frame received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the peer was heard from since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Total frames refused for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RelayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("dropped_frames", &self.drop_count())
            .finish_non_exhaustive()
    }
}
