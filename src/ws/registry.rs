//! Connected-client registry.
//!
//! In-memory map of live WebSocket sessions to the users behind them.
//! Invariant: no two entries share a user id — a new login evicts the
//! user's previous session. State lives for the process lifetime only and
//! is rebuilt empty on restart.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message};
use parking_lot::Mutex;
use thiserror::Error;

use crate::directory::{DirectoryError, UserDirectory, UserSnapshot};
use crate::ws::ConnectionSender;

/// Close code sent to a session displaced by a newer login.
pub const CLOSE_SESSION_REPLACED: u16 = 4005;

/// Handle to one live connection: the transport-assigned session id plus
/// the sender half of the connection's outbound channel.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    session_id: String,
    sender: ConnectionSender,
}

impl ConnectionHandle {
    pub fn new(session_id: impl Into<String>, sender: ConnectionSender) -> Self {
        Self {
            session_id: session_id.into(),
            sender,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Server-initiated close. Fire-and-forget and idempotent: once the
    /// connection's writer is gone the send fails silently.
    pub fn terminate(&self) {
        let frame = CloseFrame {
            code: CLOSE_SESSION_REPLACED,
            reason: "Signed in from another session".into(),
        };
        let _ = self.sender.send(Message::Close(Some(frame)));
    }

    fn sender(&self) -> &ConnectionSender {
        &self.sender
    }
}

/// One registered session: the connection handle and the user snapshot
/// captured when the session authenticated.
struct SessionRecord {
    handle: ConnectionHandle,
    user: UserSnapshot,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("user {0} does not exist")]
    UserNotFound(String),
    #[error("user {0} is inactive")]
    UserInactive(String),
    #[error("no session registered under {0}")]
    SessionNotFound(String),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Registry of currently connected clients, at most one session per user.
///
/// All mutation goes through `register` / `unregister`; the map sits behind
/// a single mutex and the lock is never held across an await.
pub struct ConnectionRegistry {
    directory: Arc<dyn UserDirectory>,
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl ConnectionRegistry {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            directory,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register an authenticated connection under its session id.
    ///
    /// Fails with `UserNotFound` / `UserInactive` when the directory
    /// rejects the user, leaving the map untouched. The directory lookup
    /// completes before the map lock is taken, so a slow lookup never
    /// stalls other sessions. Eviction of the user's previous session and
    /// insertion of the new one happen in one critical section: the map
    /// never holds two sessions for the same user, even under concurrent
    /// registrations.
    pub async fn register(
        &self,
        handle: ConnectionHandle,
        user_id: &str,
    ) -> Result<(), RegistryError> {
        let user = self
            .directory
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| RegistryError::UserNotFound(user_id.to_string()))?;

        if !user.is_active {
            return Err(RegistryError::UserInactive(user_id.to_string()));
        }

        let mut sessions = self.sessions.lock();

        // At most one match can exist, so the first is the only one.
        let stale = sessions
            .iter()
            .find(|(_, record)| record.user.id == user.id)
            .map(|(session_id, _)| session_id.clone());

        if let Some(stale_id) = stale {
            if let Some(record) = sessions.remove(&stale_id) {
                tracing::info!(
                    user_id = %user.id,
                    evicted_session = %stale_id,
                    "Evicting previous session for user"
                );
                record.handle.terminate();
            }
        }

        tracing::debug!(
            user_id = %user.id,
            session_id = %handle.session_id(),
            "Session registered"
        );
        sessions.insert(handle.session_id().to_string(), SessionRecord { handle, user });

        Ok(())
    }

    /// Drop the record for a session. A no-op when the session was never
    /// registered or was already evicted — disconnect notifications may
    /// arrive before, after, or instead of a completed registration.
    pub fn unregister(&self, session_id: &str) {
        if self.sessions.lock().remove(session_id).is_some() {
            tracing::debug!(session_id = %session_id, "Session unregistered");
        }
    }

    /// Ids of all currently registered sessions, in no particular order.
    pub fn active_session_ids(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Display name captured when the session registered.
    pub fn display_name(&self, session_id: &str) -> Result<String, RegistryError> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|record| record.user.full_name.clone())
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.to_string()))
    }

    /// Outbound senders of every live session, for event fan-out.
    pub fn senders(&self) -> Vec<ConnectionSender> {
        self.sessions
            .lock()
            .values()
            .map(|record| record.handle.sender().clone())
            .collect()
    }
}
