use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::ws::broadcast;

/// Events a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Chat line relayed to every connected client.
    MessageFromClient { message: String },
}

/// Events the server pushes to clients.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Current set of live session ids. Pushed whenever a client connects
    /// or disconnects.
    ClientsUpdated { sessions: Vec<String> },
    /// Chat line fanned out to every connected client.
    MessageFromServer { full_name: String, message: String },
}

/// Handle an incoming text frame: decode the event and dispatch.
/// Malformed frames are logged and dropped; the connection stays up.
pub async fn handle_text_message(text: &str, state: &AppState, session_id: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(
                session_id = %session_id,
                error = %e,
                "Ignoring malformed client event"
            );
            return;
        }
    };

    match event {
        ClientEvent::MessageFromClient { message } => {
            // Display name comes from the registry snapshot, so an evicted
            // or unregistered session cannot speak.
            let full_name = match state.registry.display_name(session_id) {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        "Dropping chat message from unregistered session"
                    );
                    return;
                }
            };

            broadcast::broadcast_event(
                &state.registry,
                &ServerEvent::MessageFromServer { full_name, message },
            );
        }
    }
}
