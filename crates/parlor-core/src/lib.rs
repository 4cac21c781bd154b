//! # parlor-core
//!
//! Types shared by every Parlor crate.
//!
//! - [`ids`]: branded identifiers for relay connections
//! - [`models`]: account domain models (`User`, `Server`)
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod models;

pub use ids::ConnectionId;
pub use models::{Server, User};
