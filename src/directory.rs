//! User lookup for the WebSocket gateway.
//!
//! The connected-client registry never touches the database directly; it
//! resolves user ids through this trait so tests can substitute an
//! in-memory directory.

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DbPool;

/// Fields of a user copied into a session record at registration time.
/// A snapshot, deliberately not a live view: later profile edits are not
/// reflected until the user reconnects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    pub id: String,
    pub full_name: String,
    pub is_active: bool,
}

/// Storage-unavailable condition from a directory lookup.
#[derive(Debug, Error)]
#[error("user directory unavailable: {0}")]
pub struct DirectoryError(pub String);

/// Authoritative store of user identity and status.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a user id. `Ok(None)` means no such user.
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserSnapshot>, DirectoryError>;
}

/// Directory backed by the `users` table.
pub struct SqliteUserDirectory {
    db: DbPool,
}

impl SqliteUserDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserSnapshot>, DirectoryError> {
        let db = self.db.clone();
        let id = user_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| DirectoryError(format!("DB lock: {}", e)))?;

            match conn.query_row(
                "SELECT id, full_name, is_active FROM users WHERE id = ?1",
                [&id],
                |row| {
                    Ok(UserSnapshot {
                        id: row.get(0)?,
                        full_name: row.get(1)?,
                        is_active: row.get(2)?,
                    })
                },
            ) {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(DirectoryError(format!("User query: {}", e))),
            }
        })
        .await
        .map_err(|e| DirectoryError(format!("Task join: {}", e)))?
    }
}
