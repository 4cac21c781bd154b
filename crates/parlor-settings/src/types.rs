//! Settings types.
//!
//! Every section is `#[serde(default)]` so a partial settings file only
//! needs to name the keys it changes.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParlorSettings {
    /// HTTP listener and static assets.
    pub server: ServerSettings,
    /// Relay hub tuning.
    pub relay: RelaySettings,
    /// Account database.
    pub database: DatabaseSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Directory holding `index.html` and other assets.
    pub static_dir: String,
    /// Maximum concurrent relay connections.
    pub max_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: "static".to_string(),
            max_connections: 1024,
        }
    }
}

/// Relay hub settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Outbound frames buffered per connection before it counts as a slow
    /// consumer.
    pub queue_capacity: usize,
    /// Upper bound on a single socket write.
    pub write_timeout_secs: u64,
    /// Ping interval.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this long without a pong or frame.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted inbound message in bytes.
    pub max_message_size: usize,
    /// Whether a sender receives its own broadcast.
    pub echo: bool,
}

impl Default for RelaySettings {
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

/// Database settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Path to the SQLite file (relative paths resolve against the working
    /// directory).
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "parlor.db".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
