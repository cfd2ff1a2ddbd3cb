//! Connection registry: maps authenticated users to their live WebSocket
//! connection and tracks online presence.
//!
//! One live entry per user — a newer connection for the same user replaces
//! the previous one, which is told to close. Every other subsystem resolves
//! "is this user connected, and on which handle" through this registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::auth::middleware::Claims;
use crate::state::AppState;
use crate::ws::ConnectionSender;

/// Presence entry for one connected user.
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub sender: ConnectionSender,
    pub display_name: String,
    pub connected_at: DateTime<Utc>,
    /// Distinguishes successive connections of the same user, so a replaced
    /// connection's teardown cannot evict its successor.
    pub conn_id: u64,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    entries: Arc<DashMap<String, PresenceEntry>>,
    next_conn_id: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user. Returns the new connection id and
    /// the replaced entry, if the user was already connected elsewhere.
    pub fn register(
        &self,
        user_id: &str,
        display_name: &str,
        sender: ConnectionSender,
    ) -> (u64, Option<PresenceEntry>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let entry = PresenceEntry {
            sender,
            display_name: display_name.to_string(),
            connected_at: Utc::now(),
            conn_id,
        };
        let replaced = self.entries.insert(user_id.to_string(), entry);

        tracing::debug!(
            user_id = %user_id,
            conn_id = conn_id,
            replaced = replaced.is_some(),
            "Connection registered"
        );
        (conn_id, replaced)
    }

    /// Remove the user's entry, but only if it still belongs to `conn_id`.
    /// Returns true if presence actually changed.
    pub fn unregister(&self, user_id: &str, conn_id: u64) -> bool {
        let removed = self
            .entries
            .remove_if(user_id, |_, entry| entry.conn_id == conn_id)
            .is_some();

        tracing::debug!(
            user_id = %user_id,
            conn_id = conn_id,
            removed = removed,
            "Connection unregistered"
        );
        removed
    }

    /// Read-only lookup of a user's live connection.
    pub fn resolve(&self, user_id: &str) -> Option<PresenceEntry> {
        self.entries.get(user_id).map(|e| e.value().clone())
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    /// Display name for a connected user, if any.
    pub fn display_name(&self, user_id: &str) -> Option<String> {
        self.entries.get(user_id).map(|e| e.display_name.clone())
    }

    /// Snapshot of all live connection senders, for whole-server broadcasts.
    pub fn senders(&self) -> Vec<ConnectionSender> {
        self.entries
            .iter()
            .map(|e| e.value().sender.clone())
            .collect()
    }

    /// Snapshot of everyone currently online, for initial state sync.
    pub fn list_online(&self) -> Vec<OnlineUser> {
        self.entries
            .iter()
            .map(|e| OnlineUser {
                user_id: e.key().clone(),
                display_name: e.value().display_name.clone(),
                connected_at: e.value().connected_at,
            })
            .collect()
    }
}

/// Presence snapshot entry, shared by the WS `online_users` event and the
/// REST presence endpoint.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct OnlineUser {
    pub user_id: String,
    pub display_name: String,
    pub connected_at: DateTime<Utc>,
}

/// GET /api/presence — snapshot of online users. Bearer auth required.
pub async fn get_presence(
    State(state): State<AppState>,
    _claims: Claims,
) -> Json<Vec<OnlineUser>> {
    Json(state.registry.list_online())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn sender() -> ConnectionSender {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn last_connection_wins() {
        let registry = ConnectionRegistry::new();
        let (first_id, replaced) = registry.register("alice", "Alice", sender());
        assert!(replaced.is_none());

        let (second_id, replaced) = registry.register("alice", "Alice", sender());
        let replaced = replaced.expect("first connection should be replaced");
        assert_eq!(replaced.conn_id, first_id);

        // The replaced connection's teardown must not evict the newer one
        assert!(!registry.unregister("alice", first_id));
        assert!(registry.is_online("alice"));

        assert!(registry.unregister("alice", second_id));
        assert!(!registry.is_online("alice"));
    }

    #[test]
    fn snapshot_lists_each_user_once() {
        let registry = ConnectionRegistry::new();
        registry.register("alice", "Alice", sender());
        registry.register("alice", "Alice", sender());
        registry.register("bob", "Bob", sender());

        let mut users: Vec<String> = registry
            .list_online()
            .into_iter()
            .map(|u| u.user_id)
            .collect();
        users.sort();
        assert_eq!(users, vec!["alice", "bob"]);
    }
}
