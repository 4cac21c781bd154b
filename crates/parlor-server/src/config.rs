//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use parlor_settings::ParlorSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the Parlor server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent relay connections.
    pub max_connections: usize,
    /// Directory served at `/` and as the fallback for unknown paths.
    pub static_dir: PathBuf,
    /// Relay hub tuning.
    pub relay: RelayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            static_dir: PathBuf::from("static"),
            relay: RelayConfig::default(),
        }
    }
}

impl From<&ParlorSettings> for ServerConfig {
    fn from(settings: &ParlorSettings) -> Self {
        let relay = &settings.relay;
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_connections: settings.server.max_connections,
            static_dir: PathBuf::from(&settings.server.static_dir),
            relay: RelayConfig {
                queue_capacity: relay.queue_capacity,
                write_timeout_secs: relay.write_timeout_secs,
                heartbeat_interval_secs: relay.heartbeat_interval_secs,
                heartbeat_timeout_secs: relay.heartbeat_timeout_secs,
                max_message_size: relay.max_message_size,
                echo: relay.echo,
            },
        }
    }
}

/// Relay hub tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Outbound frames buffered per connection. A full queue marks the
    /// recipient as a slow consumer and it is evicted.
    pub queue_capacity: usize,
    /// Upper bound on one socket write.
    pub write_timeout_secs: u64,
    /// Ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close after this many seconds without a pong or inbound frame.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Deliver a frame back to the connection that sent it.
    pub echo: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            write_timeout_secs: 10,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
            echo: true,
        }
    }
}

impl RelayConfig {
    /// Write timeout as a `Duration` (at least one second).
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs.max(1))
    }

    /// Heartbeat interval as a `Duration` (at least one second).
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Heartbeat timeout as a `Duration`.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_random_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn default_relay_echoes() {
        let cfg = RelayConfig::default();
        assert!(cfg.echo);
        assert_eq!(cfg.queue_capacity, 256);
        assert_eq!(cfg.max_message_size, 64 * 1024);
    }

    #[test]
    fn durations_are_clamped() {
        let cfg = RelayConfig {
            write_timeout_secs: 0,
            heartbeat_interval_secs: 0,
            ..RelayConfig::default()
        };
        assert_eq!(cfg.write_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(1));
    }

    #[test]
    fn from_settings_copies_every_field() {
        let mut settings = ParlorSettings::default();
        settings.server.host = "10.0.0.1".into();
        settings.server.port = 9000;
        settings.server.static_dir = "/srv/www".into();
        settings.server.max_connections = 3;
        settings.relay.echo = false;
        settings.relay.queue_capacity = 4;

        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.host, "10.0.0.1");
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.static_dir, PathBuf::from("/srv/www"));
        assert_eq!(cfg.max_connections, 3);
        assert!(!cfg.relay.echo);
        assert_eq!(cfg.relay.queue_capacity, 4);
    }
}
