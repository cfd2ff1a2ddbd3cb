//! Chat event handlers: room join/leave, message send with external
//! persistence, reactions, soft deletion, and typing indicators.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::chat::{ChatError, ChatMessage, Reaction};
use crate::notify::{Notification, NotificationKind};
use crate::state::AppState;
use crate::ws::protocol::{HandlerResult, ServerEvent};

/// Soft-deleted messages keep their row; content is replaced with this marker.
pub const DELETED_PLACEHOLDER: &str = "This message has been deleted";

/// Deletion is only allowed this long after the original send.
pub const DELETE_WINDOW_MINUTES: i64 = 15;

/// Client-generated placeholder ids for not-yet-persisted messages carry
/// this prefix; reaction events against them are dropped.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Membership check against the persisted chat record.
async fn require_participant(
    state: &AppState,
    user_id: &str,
    chat_id: &str,
) -> Result<Vec<String>, ChatError> {
    let participants = state
        .chat_store
        .participants(chat_id)
        .await?
        .ok_or(ChatError::UnknownChat)?;
    if !participants.iter().any(|p| p == user_id) {
        return Err(ChatError::NotAParticipant);
    }
    Ok(participants)
}

/// Join the chat's fanout room, authorized against the chat's participant
/// roster. Unknown chats and non-participants are a logged no-op, not a
/// protocol error surfaced to the other party.
pub async fn join_chat(state: &AppState, user_id: &str, chat_id: &str) -> HandlerResult {
    match require_participant(state, user_id, chat_id).await {
        Ok(_) => {
            state.rooms.join(chat_id, user_id);
            tracing::debug!(user_id = %user_id, chat_id = %chat_id, "Joined chat room");
        }
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                chat_id = %chat_id,
                error = %e,
                "Rejected chat room join"
            );
        }
    }
    Ok(None)
}

pub fn leave_chat(state: &AppState, user_id: &str, chat_id: &str) -> HandlerResult {
    state.rooms.leave(chat_id, user_id);
    Ok(None)
}

/// Persist a new message and fan it out to the chat room. Persistence
/// failure is terminal for the attempt: the sender alone hears about it,
/// nothing is broadcast and nothing is retried.
pub async fn send_message(
    state: &AppState,
    sender_id: &str,
    chat_id: &str,
    content: String,
    reply_to: Option<String>,
) -> HandlerResult {
    let participants = require_participant(state, sender_id, chat_id).await?;

    let message = ChatMessage {
        id: Uuid::new_v4().to_string(),
        sender: sender_id.to_string(),
        content,
        timestamp: Utc::now(),
        is_deleted: false,
        deleted_at: None,
        reactions: Vec::new(),
        reply_to,
    };

    state
        .chat_store
        .append(chat_id, message.clone())
        .await
        .map_err(ChatError::from)?;

    state.rooms.broadcast(
        &state.registry,
        chat_id,
        &ServerEvent::NewMessage {
            chat_id: chat_id.to_string(),
            message: message.clone(),
        },
    );

    let sender_name = state
        .registry
        .display_name(sender_id)
        .unwrap_or_else(|| sender_id.to_string());
    for recipient in participants.iter().filter(|p| *p != sender_id) {
        state.notifier.enqueue(Notification {
            recipient_id: recipient.clone(),
            kind: NotificationKind::NewMessage,
            body: format!("New message from {}", sender_name),
        });
    }

    Ok(None)
}

/// Add a reaction and re-broadcast the message's full reaction list.
/// Duplicate adds are a no-op.
pub async fn add_reaction(
    state: &AppState,
    user_id: &str,
    chat_id: &str,
    message_id: &str,
    emoji: &str,
) -> HandlerResult {
    let reaction = Reaction {
        user_id: user_id.to_string(),
        emoji: emoji.to_string(),
    };
    update_reactions(state, user_id, chat_id, message_id, |reactions| {
        if !reactions.contains(&reaction) {
            reactions.push(reaction);
        }
    })
    .await
}

/// Remove one of the user's reactions, or all of them if no emoji is named.
pub async fn remove_reaction(
    state: &AppState,
    user_id: &str,
    chat_id: &str,
    message_id: &str,
    emoji: Option<&str>,
) -> HandlerResult {
    update_reactions(state, user_id, chat_id, message_id, |reactions| match emoji {
        Some(emoji) => reactions.retain(|r| !(r.user_id == user_id && r.emoji == emoji)),
        None => reactions.retain(|r| r.user_id != user_id),
    })
    .await
}

/// Shared reaction mutation path: load, apply, persist, re-broadcast.
/// Reactions against temporary client-side ids are dropped.
async fn update_reactions(
    state: &AppState,
    user_id: &str,
    chat_id: &str,
    message_id: &str,
    apply: impl FnOnce(&mut Vec<Reaction>),
) -> HandlerResult {
    if message_id.starts_with(TEMP_ID_PREFIX) {
        tracing::debug!(
            user_id = %user_id,
            message_id = %message_id,
            "Ignoring reaction on unpersisted message"
        );
        return Ok(None);
    }

    let mut message = state
        .chat_store
        .message(chat_id, message_id)
        .await
        .map_err(ChatError::from)?
        .ok_or(ChatError::UnknownMessage)?;

    apply(&mut message.reactions);

    state
        .chat_store
        .update(chat_id, message.clone())
        .await
        .map_err(ChatError::from)?;

    state.rooms.broadcast(
        &state.registry,
        chat_id,
        &ServerEvent::MessageReactionUpdate {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            reactions: message.reactions,
        },
    );

    Ok(None)
}

/// Soft-delete a message: sender only, within the deletion window. The
/// content is replaced with a revocation marker; nothing is hard-deleted.
pub async fn delete_message(
    state: &AppState,
    requester_id: &str,
    chat_id: &str,
    message_id: &str,
) -> HandlerResult {
    let mut message = state
        .chat_store
        .message(chat_id, message_id)
        .await
        .map_err(ChatError::from)?
        .ok_or(ChatError::UnknownMessage)?;

    if message.sender != requester_id {
        return Err(ChatError::NotTheSender.into());
    }

    let now = Utc::now();
    if now - message.timestamp > Duration::minutes(DELETE_WINDOW_MINUTES) {
        return Err(ChatError::DeleteWindowExpired(DELETE_WINDOW_MINUTES).into());
    }

    message.is_deleted = true;
    message.deleted_at = Some(now);
    message.content = DELETED_PLACEHOLDER.to_string();

    state
        .chat_store
        .update(chat_id, message)
        .await
        .map_err(ChatError::from)?;

    state.rooms.broadcast(
        &state.registry,
        chat_id,
        &ServerEvent::MessageDeleted {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            content: DELETED_PLACEHOLDER.to_string(),
            deleted_at: now,
        },
    );

    Ok(None)
}

/// Typing indicators: pure broadcast to every other room member.
pub fn typing(
    state: &AppState,
    user_id: &str,
    display_name: &str,
    chat_id: &str,
    started: bool,
) -> HandlerResult {
    let event = if started {
        ServerEvent::UserTyping {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
        }
    } else {
        ServerEvent::UserStopTyping {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
        }
    };
    state
        .rooms
        .broadcast_except(&state.registry, chat_id, user_id, &event);
    Ok(None)
}
