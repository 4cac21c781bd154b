//! WebSocket relay: every inbound frame is fanned out to all open connections.
//!
//! - [`registry::ConnectionRegistry`] is the set of open connections
//! - [`connection::RelayConnection`] owns one bounded outbound queue drained
//!   by a single writer task, so sends to one socket never interleave
//! - [`hub::RelayHub`] ties them together and runs the per-socket loops

pub mod connection;
pub mod error;
pub mod frame;
pub mod heartbeat;
pub mod hub;
pub mod registry;

pub use connection::{ConnectionState, RelayConnection};
pub use error::{CloseReason, RelayError, SendError};
pub use frame::Frame;
pub use hub::{FanOut, RelayHub};
pub use registry::ConnectionRegistry;
