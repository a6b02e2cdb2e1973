use std::sync::Arc;

use crate::db::DbPool;
use crate::ws::registry::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Connected WebSocket clients, at most one session per user
    pub registry: Arc<ConnectionRegistry>,
}
