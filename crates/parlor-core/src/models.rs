//! Account domain models.

use serde::{Deserialize, Serialize};

/// A registered account.
///
/// Credentials never leave the store: there is deliberately no password
/// field here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Row id.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Servers attached to this user during the current request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
}

/// A named chat server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Row id.
    pub id: i64,
    /// Unique server name.
    pub name: String,
    /// Member count.
    pub members: i64,
    /// Id of the user that created the server.
    pub created_by: Option<i64>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}
