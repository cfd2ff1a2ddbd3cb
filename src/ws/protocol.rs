//! JSON wire protocol: inbound client events, outbound server events, and
//! the dispatch loop that routes decoded events to the subsystem handlers.
//!
//! Every frame is a JSON envelope `{"request_id"?, "event", "data"}`. A
//! client that sets `request_id` gets exactly one response on it: a typed
//! response, a bare `ack`, or an error event. Events without a `request_id`
//! only hear back on failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::{self, CallEndReason, CallError, CallErrorCode, CallParticipant, SessionDescKind};
use crate::chat::{self, ChatError, ChatMessage, Reaction};
use crate::presence::OnlineUser;
use crate::state::AppState;
use crate::ws::broadcast::send_event;
use crate::ws::ConnectionSender;

/// Inbound frame: optional correlation id plus the tagged event.
#[derive(Debug, Deserialize)]
pub struct ClientEnvelope {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub event: ClientEvent,
}

/// Events sent from a club member's client to the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChat {
        chat_id: String,
    },
    LeaveChat {
        chat_id: String,
    },
    SendMessage {
        chat_id: String,
        content: String,
        #[serde(default)]
        reply_to: Option<String>,
    },
    MessageReaction {
        chat_id: String,
        message_id: String,
        emoji: String,
    },
    RemoveReaction {
        chat_id: String,
        message_id: String,
        /// Absent means remove every reaction this user placed.
        #[serde(default)]
        emoji: Option<String>,
    },
    TypingStart {
        chat_id: String,
    },
    TypingEnd {
        chat_id: String,
    },
    DeleteMessage {
        chat_id: String,
        message_id: String,
    },
    VideoCallRequest {
        target_user_id: String,
    },
    VideoCallAccepted {
        caller_id: String,
    },
    VideoCallRejected {
        caller_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    VideoCallEnded {
        room_id: String,
    },
    WebrtcSignal {
        target_user_id: String,
        signal: Value,
    },
    WebrtcOffer {
        target_user_id: String,
        sdp: Value,
    },
    WebrtcAnswer {
        target_user_id: String,
        sdp: Value,
    },
    WebrtcIceCandidate {
        target_user_id: String,
        candidate: Value,
    },
    CheckUserOnline {
        target_user_id: String,
    },
    NetworkQuality {
        room_id: String,
        stats: Value,
    },
}

/// Outbound frame: correlation id (echoed from the request, if any) plus the
/// tagged event.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub event: ServerEvent,
}

/// Events pushed from the server to club members' clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    UserOnline {
        user_id: String,
        display_name: String,
    },
    UserOffline {
        user_id: String,
    },
    OnlineUsers {
        users: Vec<OnlineUser>,
    },
    NewMessage {
        chat_id: String,
        message: ChatMessage,
    },
    MessageReactionUpdate {
        chat_id: String,
        message_id: String,
        reactions: Vec<Reaction>,
    },
    MessageDeleted {
        chat_id: String,
        message_id: String,
        content: String,
        deleted_at: DateTime<Utc>,
    },
    UserTyping {
        chat_id: String,
        user_id: String,
        display_name: String,
    },
    UserStopTyping {
        chat_id: String,
        user_id: String,
    },
    IncomingCall {
        caller_id: String,
        caller_name: String,
    },
    CallConnected {
        room_id: String,
        started_at: DateTime<Utc>,
        participants: Vec<CallParticipant>,
    },
    CallRejected {
        rejecter_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    CallEnded {
        room_id: String,
        reason: CallEndReason,
    },
    CallError {
        code: CallErrorCode,
        message: String,
    },
    WebrtcSignal {
        from: String,
        from_name: String,
        room_id: String,
        timestamp: DateTime<Utc>,
        signal: Value,
    },
    WebrtcOffer {
        from: String,
        sdp: Value,
    },
    WebrtcAnswer {
        from: String,
        sdp: Value,
    },
    WebrtcIceCandidate {
        from: String,
        candidate: Value,
    },
    PeerNetworkQuality {
        room_id: String,
        from: String,
        report: call::quality::QualityReport,
    },
    UserOnlineStatus {
        user_id: String,
        online: bool,
    },
    Ack {},
    Error {
        code: String,
        message: String,
    },
}

/// Failure of an inbound event handler, reduced to the wire vocabulary by
/// the dispatch loop. Call-subsystem failures carry a fixed-vocabulary code
/// so clients can branch; everything else maps to a generic error event.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("{0}")]
    Invalid(String),
}

impl HandlerError {
    fn into_event(self) -> ServerEvent {
        match self {
            HandlerError::Call(e) => ServerEvent::CallError {
                code: e.code(),
                message: e.to_string(),
            },
            HandlerError::Chat(e) => ServerEvent::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            },
            HandlerError::Invalid(message) => ServerEvent::Error {
                code: "INVALID_REQUEST".to_string(),
                message,
            },
        }
    }
}

/// Outcome of one inbound event: an optional direct response to the sender.
/// Broadcasts to other parties happen inside the handlers.
pub type HandlerResult = Result<Option<ServerEvent>, HandlerError>;

/// Handle one incoming text frame: decode, dispatch, answer.
pub async fn handle_text_message(
    text: &str,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
    display_name: &str,
) {
    let envelope: ClientEnvelope = match serde_json::from_str(text) {
        Ok(env) => env,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to decode event frame");
            send_event(
                tx,
                None,
                &ServerEvent::Error {
                    code: "INVALID_REQUEST".to_string(),
                    message: "Malformed event payload".to_string(),
                },
            );
            return;
        }
    };

    let request_id = envelope.request_id.as_deref();
    match dispatch_event(envelope.event, state, user_id, display_name).await {
        Ok(Some(response)) => send_event(tx, request_id, &response),
        Ok(None) => {
            // Request/response callers still get a bare acknowledgment
            if request_id.is_some() {
                send_event(tx, request_id, &ServerEvent::Ack {});
            }
        }
        Err(e) => send_event(tx, request_id, &e.into_event()),
    }
}

async fn dispatch_event(
    event: ClientEvent,
    state: &AppState,
    user_id: &str,
    display_name: &str,
) -> HandlerResult {
    match event {
        ClientEvent::JoinChat { chat_id } => chat::relay::join_chat(state, user_id, &chat_id).await,
        ClientEvent::LeaveChat { chat_id } => chat::relay::leave_chat(state, user_id, &chat_id),
        ClientEvent::SendMessage {
            chat_id,
            content,
            reply_to,
        } => chat::relay::send_message(state, user_id, &chat_id, content, reply_to).await,
        ClientEvent::MessageReaction {
            chat_id,
            message_id,
            emoji,
        } => chat::relay::add_reaction(state, user_id, &chat_id, &message_id, &emoji).await,
        ClientEvent::RemoveReaction {
            chat_id,
            message_id,
            emoji,
        } => {
            chat::relay::remove_reaction(state, user_id, &chat_id, &message_id, emoji.as_deref())
                .await
        }
        ClientEvent::TypingStart { chat_id } => {
            chat::relay::typing(state, user_id, display_name, &chat_id, true)
        }
        ClientEvent::TypingEnd { chat_id } => {
            chat::relay::typing(state, user_id, display_name, &chat_id, false)
        }
        ClientEvent::DeleteMessage {
            chat_id,
            message_id,
        } => chat::relay::delete_message(state, user_id, &chat_id, &message_id).await,
        ClientEvent::VideoCallRequest { target_user_id } => {
            call::negotiation::request_call(state, user_id, display_name, &target_user_id)
        }
        ClientEvent::VideoCallAccepted { caller_id } => {
            call::negotiation::accept_call(state, user_id, display_name, &caller_id)
        }
        ClientEvent::VideoCallRejected { caller_id, reason } => {
            call::negotiation::reject_call(state, user_id, &caller_id, reason)
        }
        ClientEvent::VideoCallEnded { room_id } => {
            call::negotiation::end_call(state, user_id, &room_id)
        }
        ClientEvent::WebrtcSignal {
            target_user_id,
            signal,
        } => call::signaling::relay_signal(state, user_id, display_name, &target_user_id, signal),
        ClientEvent::WebrtcOffer {
            target_user_id,
            sdp,
        } => call::signaling::relay_session_desc(
            state,
            user_id,
            &target_user_id,
            SessionDescKind::Offer,
            sdp,
        ),
        ClientEvent::WebrtcAnswer {
            target_user_id,
            sdp,
        } => call::signaling::relay_session_desc(
            state,
            user_id,
            &target_user_id,
            SessionDescKind::Answer,
            sdp,
        ),
        ClientEvent::WebrtcIceCandidate {
            target_user_id,
            candidate,
        } => call::signaling::relay_session_desc(
            state,
            user_id,
            &target_user_id,
            SessionDescKind::IceCandidate,
            candidate,
        ),
        ClientEvent::CheckUserOnline { target_user_id } => Ok(Some(ServerEvent::UserOnlineStatus {
            online: state.registry.is_online(&target_user_id),
            user_id: target_user_id,
        })),
        ClientEvent::NetworkQuality { room_id, stats } => {
            call::quality::report_quality(state, user_id, &room_id, &stats)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_snake_case_event_names() {
        let frame = r#"{"request_id":"r1","event":"video_call_request","data":{"target_user_id":"bob"}}"#;
        let env: ClientEnvelope = serde_json::from_str(frame).unwrap();
        assert_eq!(env.request_id.as_deref(), Some("r1"));
        assert!(matches!(
            env.event,
            ClientEvent::VideoCallRequest { ref target_user_id } if target_user_id == "bob"
        ));
    }

    #[test]
    fn remove_reaction_tolerates_missing_emoji() {
        let frame = r#"{"event":"remove_reaction","data":{"chat_id":"c1","message_id":"m1"}}"#;
        let env: ClientEnvelope = serde_json::from_str(frame).unwrap();
        assert!(matches!(
            env.event,
            ClientEvent::RemoveReaction { emoji: None, .. }
        ));
    }

    #[test]
    fn missing_request_id_is_tolerated() {
        let frame = r#"{"event":"typing_start","data":{"chat_id":"c1"}}"#;
        let env: ClientEnvelope = serde_json::from_str(frame).unwrap();
        assert!(env.request_id.is_none());
    }

    #[test]
    fn server_events_tag_with_snake_case() {
        let env = ServerEnvelope {
            request_id: None,
            event: ServerEvent::UserOffline {
                user_id: "alice".to_string(),
            },
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["event"], "user_offline");
        assert_eq!(json["data"]["user_id"], "alice");
    }

    #[test]
    fn call_error_codes_serialize_screaming() {
        let event = ServerEvent::CallError {
            code: CallErrorCode::UserBusy,
            message: "busy".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["code"], "USER_BUSY");
    }
}
