//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Returns the handle used to render `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Relay connections registered (counter).
pub const RELAY_CONNECTIONS_TOTAL: &str = "relay_connections_total";
/// Relay connections removed (counter, labels: reason).
pub const RELAY_DISCONNECTIONS_TOTAL: &str = "relay_disconnections_total";
/// Currently registered relay connections (gauge).
pub const RELAY_CONNECTIONS_ACTIVE: &str = "relay_connections_active";
/// Frames fanned out (counter).
pub const RELAY_MESSAGES_TOTAL: &str = "relay_messages_total";
/// Recipients evicted because a frame could not be queued (counter).
pub const RELAY_EVICTIONS_TOTAL: &str = "relay_evictions_total";
