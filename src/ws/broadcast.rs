use crate::ws::protocol::ServerEvent;
use crate::ws::registry::ConnectionRegistry;

/// Serialize an event and fan it out to every connected client.
pub fn broadcast_event(registry: &ConnectionRegistry, event: &ServerEvent) {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(_) => return,
    };
    let msg = axum::extract::ws::Message::Text(text.into());

    for sender in registry.senders() {
        let _ = sender.send(msg.clone());
    }
}

/// Push the current session list to every client.
pub fn broadcast_clients_updated(registry: &ConnectionRegistry) {
    let sessions = registry.active_session_ids();
    broadcast_event(registry, &ServerEvent::ClientsUpdated { sessions });
}
