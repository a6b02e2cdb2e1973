//! Connected-client presence over REST.
//!
//! Read-only view of the WebSocket registry for dashboards and admin
//! tooling; the push-based view is the `clients-updated` WS event.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::middleware::Claims;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub session_id: String,
    pub display_name: String,
}

/// GET /api/presence — Current sessions with their display names. JWT auth
/// required. A session can disconnect between listing and name lookup;
/// those are skipped rather than failing the whole response.
pub async fn get_presence(
    State(state): State<AppState>,
    _claims: Claims,
) -> Json<Vec<PresenceResponse>> {
    let registry = &state.registry;

    let entries: Vec<PresenceResponse> = registry
        .active_session_ids()
        .into_iter()
        .filter_map(|session_id| {
            registry
                .display_name(&session_id)
                .ok()
                .map(|display_name| PresenceResponse {
                    session_id,
                    display_name,
                })
        })
        .collect();

    Json(entries)
}
