//! External chat store boundary.
//!
//! The club application persists chats and messages in its own document
//! store; the realtime core only needs participant lookups and message
//! append/read/update. [`MemoryChatStore`] is the single-process default
//! and the test double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Failure talking to the backing store. Treated as transient: surfaced to
/// the sender, never retried by the core.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One emoji reaction, keyed by (user, emoji).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: String,
    pub emoji: String,
}

/// A persisted chat message as relayed over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Participant roster of a chat, or None if the chat does not exist.
    async fn participants(&self, chat_id: &str) -> Result<Option<Vec<String>>, StoreError>;

    /// Append a freshly constructed message to a chat.
    async fn append(&self, chat_id: &str, message: ChatMessage) -> Result<(), StoreError>;

    /// Fetch a single message.
    async fn message(&self, chat_id: &str, message_id: &str)
        -> Result<Option<ChatMessage>, StoreError>;

    /// Replace a message in place (reactions, soft delete).
    async fn update(&self, chat_id: &str, message: ChatMessage) -> Result<(), StoreError>;
}

/// In-memory store for single-process deployments and tests.
#[derive(Default)]
pub struct MemoryChatStore {
    participants: DashMap<String, Vec<String>>,
    messages: DashMap<String, Vec<ChatMessage>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chat with the given participant roster.
    pub fn seed_chat(&self, chat_id: &str, participants: Vec<String>) {
        self.participants.insert(chat_id.to_string(), participants);
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn participants(&self, chat_id: &str) -> Result<Option<Vec<String>>, StoreError> {
        Ok(self.participants.get(chat_id).map(|p| p.value().clone()))
    }

    async fn append(&self, chat_id: &str, message: ChatMessage) -> Result<(), StoreError> {
        self.messages
            .entry(chat_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn message(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<Option<ChatMessage>, StoreError> {
        Ok(self
            .messages
            .get(chat_id)
            .and_then(|msgs| msgs.iter().find(|m| m.id == message_id).cloned()))
    }

    async fn update(&self, chat_id: &str, message: ChatMessage) -> Result<(), StoreError> {
        if let Some(mut msgs) = self.messages.get_mut(chat_id) {
            if let Some(slot) = msgs.iter_mut().find(|m| m.id == message.id) {
                *slot = message;
            }
        }
        Ok(())
    }
}
