//! Room membership: named groups of connections that receive the same
//! broadcast events. Chat rooms and call rooms share this mechanism.
//!
//! Rooms only track currently-connected users; there is no offline delivery.
//! A room is created on first join and removed once its last member leaves.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::presence::ConnectionRegistry;
use crate::ws::broadcast::send_to_user;
use crate::ws::protocol::ServerEvent;

#[derive(Clone, Default)]
pub struct RoomStore {
    rooms: Arc<DashMap<String, HashSet<String>>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to a room, creating the room if needed. Idempotent.
    /// Authorization against the underlying resource happens at the caller.
    pub fn join(&self, room_id: &str, user_id: &str) {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    /// Remove a user from a room. Idempotent. Removes the room once empty.
    pub fn leave(&self, room_id: &str, user_id: &str) {
        if let Some(mut entry) = self.rooms.get_mut(room_id) {
            entry.value_mut().remove(user_id);
            if entry.value().is_empty() {
                drop(entry);
                self.rooms.remove(room_id);
            }
        }
    }

    pub fn exists(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn contains(&self, room_id: &str, user_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|m| m.value().contains(user_id))
            .unwrap_or(false)
    }

    pub fn members_of(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|m| m.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove a user from every room they belong to, deleting rooms that
    /// become empty. Returns the room ids the user was in.
    pub fn leave_all(&self, user_id: &str) -> Vec<String> {
        let mut left = Vec::new();

        // Collect ids first to avoid holding shard locks during mutation
        let room_ids: Vec<String> = self.rooms.iter().map(|e| e.key().clone()).collect();

        for room_id in room_ids {
            if let Some(mut entry) = self.rooms.get_mut(&room_id) {
                if entry.value_mut().remove(user_id) {
                    left.push(room_id.clone());
                }
                if entry.value().is_empty() {
                    drop(entry);
                    self.rooms.remove(&room_id);
                }
            }
        }

        left
    }

    /// Deliver an event to every member of a room that is currently
    /// connected. Offline members are silently skipped, never queued.
    pub fn broadcast(&self, registry: &ConnectionRegistry, room_id: &str, event: &ServerEvent) {
        for member in self.members_of(room_id) {
            send_to_user(registry, &member, event);
        }
    }

    /// Like `broadcast`, but skips the originating user (typing indicators,
    /// quality reports).
    pub fn broadcast_except(
        &self,
        registry: &ConnectionRegistry,
        room_id: &str,
        exclude: &str,
        event: &ServerEvent,
    ) {
        for member in self.members_of(room_id) {
            if member != exclude {
                send_to_user(registry, &member, event);
            }
        }
    }
}
