//! Graceful shutdown coordination via `CancellationToken`.
//!
//! The coordinator owns the server token. The relay hub runs under a child
//! of it, so cancelling the server closes every relay connection while a
//! hub-only shutdown leaves the listener alone.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default time to wait for tasks before giving up.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinates shutdown of the listener and the relay hub.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    relay: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh token.
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Coordinate under `token`. Cancelling it from outside shuts the
    /// server down the same way [`shutdown`](Self::shutdown) does.
    pub fn with_token(token: CancellationToken) -> Self {
        let relay = token.child_token();
        Self { token, relay }
    }

    /// Server token, cancelled when shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Token for the relay hub. Cancelled with the server token.
    pub fn relay_token(&self) -> CancellationToken {
        self.relay.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then wait up to `timeout` for `handles` to finish.
    ///
    /// Returns `false` if the timeout elapsed first. Tasks that panicked
    /// count as finished and are logged.
    pub async fn graceful_shutdown(
        &self,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();
        let tasks = handles.len();
        info!(
            tasks,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining server tasks"
        );

        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(results) => {
                let failed = results.iter().filter(|r| r.is_err()).count();
                if failed > 0 {
                    warn!(failed, tasks, "server tasks ended abnormally during shutdown");
                }
                info!(tasks, "server drained");
                true
            }
            Err(_) => {
                warn!(?timeout, "shutdown timed out, relay tasks may still be running");
                false
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
