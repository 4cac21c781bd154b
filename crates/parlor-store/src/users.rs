//! User accounts: signup, login, lookup.

use chrono::Utc;
use parlor_core::User;
use rusqlite::{OptionalExtension, params};
use tracing::{debug, instrument};

use crate::credentials;
use crate::database::Database;
use crate::error::StoreError;

/// Repository for the `users` table.
#[derive(Clone)]
pub struct UserRepo {
    db: Database,
}

struct CredentialRow {
    user: User,
    password_hash: String,
    salt: String,
}

impl UserRepo {
    /// Create a repository over `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether `username` is already registered.
    #[instrument(skip(self))]
    pub fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE username = ?1",
                [username],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Register a new account.
    ///
    /// Fails with [`StoreError::Conflict`] when the username is taken.
    #[instrument(skip(self, password))]
    pub fn signup(&self, username: &str, password: &str) -> Result<User, StoreError> {
        validate(username, password)?;

        if self.username_exists(username)? {
            return Err(StoreError::Conflict(format!("username {username}")));
        }

        let salt = credentials::new_salt();
        let hash = credentials::hash_password(password, &salt);
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, password_hash, salt, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![username, hash, salt, now],
            );
            match inserted {
                Ok(_) => {}
                // lost a race with a concurrent signup for the same name
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::Conflict(format!("username {username}")));
                }
                Err(e) => return Err(e.into()),
            }
            let id = conn.last_insert_rowid();
            debug!(user_id = id, "user created");
            Ok(User {
                id,
                username: username.to_string(),
                created_at: now,
                servers: Vec::new(),
            })
        })
    }

    /// Authenticate a user.
    ///
    /// Unknown usernames yield [`StoreError::NotFound`]; a wrong password
    /// yields [`StoreError::InvalidCredentials`].
    #[instrument(skip(self, password))]
    pub fn login(&self, username: &str, password: &str) -> Result<User, StoreError> {
        let row = self
            .credential_row(username)?
            .ok_or_else(|| StoreError::NotFound(format!("user {username}")))?;

        if !credentials::verify_password(password, &row.salt, &row.password_hash) {
            return Err(StoreError::InvalidCredentials);
        }
        Ok(row.user)
    }

    /// Fetch a user by row id.
    #[instrument(skip(self))]
    pub fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, created_at FROM users WHERE id = ?1",
                [id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: row.get(2)?,
                        servers: Vec::new(),
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
        })
    }

    fn credential_row(&self, username: &str) -> Result<Option<CredentialRow>, StoreError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, created_at, password_hash, salt FROM users WHERE username = ?1",
                    [username],
                    |row| {
                        Ok(CredentialRow {
                            user: User {
                                id: row.get(0)?,
                                username: row.get(1)?,
                                created_at: row.get(2)?,
                                servers: Vec::new(),
                            },
                            password_hash: row.get(3)?,
                            salt: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }
}

fn validate(username: &str, password: &str) -> Result<(), StoreError> {
    if username.trim().is_empty() {
        return Err(StoreError::InvalidInput("username must not be empty".into()));
    }
    if password.is_empty() {
        return Err(StoreError::InvalidInput("password must not be empty".into()));
    }
    Ok(())
}
