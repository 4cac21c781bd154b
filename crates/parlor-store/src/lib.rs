//! # parlor-store
//!
//! SQLite persistence for accounts and chat servers.
//!
//! All access goes through [`Database`], a cloneable handle around a single
//! mutex-guarded `rusqlite::Connection`. Repositories are thin, synchronous
//! wrappers; async callers should run them on a blocking thread.

#![deny(unsafe_code)]

pub mod credentials;
pub mod database;
pub mod error;
pub mod schema;
pub mod servers;
pub mod users;

pub use database::Database;
pub use error::StoreError;
pub use servers::ServerRepo;
pub use users::UserRepo;
