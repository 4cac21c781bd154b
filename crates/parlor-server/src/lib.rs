//! # parlor-server
//!
//! Axum HTTP + `WebSocket` server.
//!
//! - HTTP endpoints: static assets, signup/login, server lookup, health, metrics
//! - Relay hub: connection registry, per-connection read loop, fan-out of every
//!   inbound frame to all registered connections
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod accounts;
pub mod assets;
pub mod config;
pub mod health;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod shutdown;

pub use config::{RelayConfig, ServerConfig};
pub use relay::hub::RelayHub;
pub use server::{ParlorServer, ServerError};
