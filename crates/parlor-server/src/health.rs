//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

use crate::relay::RelayHub;

/// Whether the relay still accepts connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Accepting relay connections.
    Ok,
    /// Shutdown started; new relay connections are refused.
    Draining,
}

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"draining"` once shutdown has begun.
    pub status: HealthStatus,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current relay connection count.
    pub connections: usize,
    /// Relay connection limit.
    pub max_connections: usize,
}

/// Read the hub's live state.
pub fn health_check(start_time: Instant, hub: &RelayHub) -> HealthResponse {
    let status = if hub.is_shut_down() {
        HealthStatus::Draining
    } else {
        HealthStatus::Ok
    };
    HealthResponse {
        status,
        uptime_secs: start_time.elapsed().as_secs(),
        connections: hub.connection_count(),
        max_connections: hub.max_connections(),
    }
}
