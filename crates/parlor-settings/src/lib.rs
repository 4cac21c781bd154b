//! # parlor-settings
//!
//! Layered configuration for Parlor.
//!
//! Precedence (lowest to highest): compiled defaults, the JSON settings file
//! (`~/.parlor/settings.json` unless a path is given), then `PARLOR_*`
//! environment variables. The binary applies CLI flags on top.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings_from_path, settings_path};
pub use types::{DatabaseSettings, LoggingSettings, ParlorSettings, RelaySettings, ServerSettings};
