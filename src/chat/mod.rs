//! Chat relay: membership-checked message fanout, reactions, typing
//! indicators, and time-boxed soft deletion. Message persistence and the
//! chat participant roster live behind the [`store::ChatStore`] trait — the
//! club's document store is an external collaborator here.

pub mod relay;
pub mod store;

pub use store::{ChatMessage, ChatStore, MemoryChatStore, Reaction, StoreError};

/// Failures surfaced to the originating client as a structured error event.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("You are not a participant of this chat")]
    NotAParticipant,
    #[error("Unknown chat")]
    UnknownChat,
    #[error("Unknown message")]
    UnknownMessage,
    #[error("Only the sender can delete a message")]
    NotTheSender,
    #[error("Messages can only be deleted within {0} minutes of sending")]
    DeleteWindowExpired(i64),
    #[error("Could not persist message, please try again")]
    Store(#[from] StoreError),
}

impl ChatError {
    /// Wire code for the generic error event.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::NotAParticipant | ChatError::NotTheSender => "UNAUTHORIZED",
            ChatError::UnknownChat => "UNKNOWN_CHAT",
            ChatError::UnknownMessage => "UNKNOWN_MESSAGE",
            ChatError::DeleteWindowExpired(_) => "DELETE_WINDOW_EXPIRED",
            ChatError::Store(_) => "SERVER_ERROR",
        }
    }
}
