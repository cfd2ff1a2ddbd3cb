//! Helpers for encoding server events and pushing them onto connections.

use axum::extract::ws::Message;

use crate::presence::ConnectionRegistry;
use crate::ws::protocol::{ServerEnvelope, ServerEvent};
use crate::ws::ConnectionSender;

/// Encode a server event (with optional correlation id) as a text frame.
pub fn encode(request_id: Option<&str>, event: &ServerEvent) -> Option<Message> {
    let envelope = ServerEnvelope {
        request_id: request_id.map(|s| s.to_string()),
        event: event.clone(),
    };
    match serde_json::to_string(&envelope) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server event");
            None
        }
    }
}

/// Send an event to one connection. Send failures mean the connection is
/// already gone; the actor's teardown handles cleanup.
pub fn send_event(tx: &ConnectionSender, request_id: Option<&str>, event: &ServerEvent) {
    if let Some(msg) = encode(request_id, event) {
        let _ = tx.send(msg);
    }
}

/// Send an event to a specific user, if currently connected.
pub fn send_to_user(registry: &ConnectionRegistry, user_id: &str, event: &ServerEvent) {
    if let Some(entry) = registry.resolve(user_id) {
        send_event(&entry.sender, None, event);
    }
}

/// Broadcast an event to every connected user.
pub fn broadcast_to_all(registry: &ConnectionRegistry, event: &ServerEvent) {
    let Some(msg) = encode(None, event) else {
        return;
    };
    for sender in registry.senders() {
        let _ = sender.send(msg.clone());
    }
}
