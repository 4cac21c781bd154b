//! Chat servers: lookup and find-or-create.

use chrono::Utc;
use parlor_core::{Server, User};
use rusqlite::{OptionalExtension, params};
use tracing::{info, instrument};

use crate::database::Database;
use crate::error::StoreError;

const SERVER_COLUMNS: &str = "id, name, members, created_by, created_at";

/// Repository for the `servers` table.
#[derive(Clone)]
pub struct ServerRepo {
    db: Database,
}

fn map_server(row: &rusqlite::Row<'_>) -> rusqlite::Result<Server> {
    Ok(Server {
        id: row.get(0)?,
        name: row.get(1)?,
        members: row.get(2)?,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl ServerRepo {
    /// Create a repository over `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Look up a server by name.
    #[instrument(skip(self))]
    pub fn find(&self, name: &str) -> Result<Option<Server>, StoreError> {
        self.db.with_conn(|conn| {
            let server = conn
                .query_row(
                    &format!("SELECT {SERVER_COLUMNS} FROM servers WHERE name = ?1"),
                    [name],
                    map_server,
                )
                .optional()?;
            Ok(server)
        })
    }

    /// Create a server owned by `user`, starting with one member.
    ///
    /// Fails with [`StoreError::Conflict`] if the name is taken.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub fn create(&self, name: &str, user: &User) -> Result<Server, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidInput("server name must not be empty".into()));
        }
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO servers (name, members, created_by, created_at) VALUES (?1, 1, ?2, ?3)",
                params![name, user.id, now],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::Conflict(format!("server {name}")));
                }
                Err(e) => return Err(e.into()),
            }
            let id = conn.last_insert_rowid();
            info!(server_id = id, name, "server created");
            Ok(Server {
                id,
                name: name.to_string(),
                members: 1,
                created_by: Some(user.id),
                created_at: now,
            })
        })
    }

    /// Return the server named `name`, creating it for `user` if absent.
    ///
    /// A freshly created server is appended to `user.servers`; an existing
    /// one is returned unchanged.
    pub fn find_or_create(&self, name: &str, user: &mut User) -> Result<Server, StoreError> {
        if let Some(existing) = self.find(name)? {
            return Ok(existing);
        }
        match self.create(name, user) {
            Ok(server) => {
                user.servers.push(server.clone());
                Ok(server)
            }
            // created concurrently between find and create
            Err(StoreError::Conflict(_)) => self
                .find(name)?
                .ok_or_else(|| StoreError::NotFound(format!("server {name}"))),
            Err(e) => Err(e),
        }
    }

    /// Servers created by `user`, oldest first.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub fn list_for_user(&self, user: &User) -> Result<Vec<Server>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SERVER_COLUMNS} FROM servers WHERE created_by = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([user.id], map_server)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
