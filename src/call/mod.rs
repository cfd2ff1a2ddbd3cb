//! Two-party call subsystem: negotiation state machine, signaling relay,
//! and client-reported quality scoring.

pub mod negotiation;
pub mod quality;
pub mod signaling;
pub mod state;

use serde::{Deserialize, Serialize};

/// Fixed error vocabulary for `call_error` events, so clients can branch
/// (retry vs. inform the user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallErrorCode {
    UserOffline,
    UserBusy,
    CallerBusy,
    CallerUnavailable,
    SignalError,
    EndCallError,
    ServerError,
}

/// Call subsystem failure, surfaced to the originator as a `call_error`.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("User is offline")]
    UserOffline,
    #[error("User is busy in another call")]
    UserBusy,
    #[error("You are already in a call")]
    CallerBusy,
    #[error("Caller is no longer available")]
    CallerUnavailable,
    #[error("{0}")]
    Signal(String),
    #[error("{0}")]
    EndCall(String),
}

impl CallError {
    pub fn code(&self) -> CallErrorCode {
        match self {
            CallError::UserOffline => CallErrorCode::UserOffline,
            CallError::UserBusy => CallErrorCode::UserBusy,
            CallError::CallerBusy => CallErrorCode::CallerBusy,
            CallError::CallerUnavailable => CallErrorCode::CallerUnavailable,
            CallError::Signal(_) => CallErrorCode::SignalError,
            CallError::EndCall(_) => CallErrorCode::EndCallError,
        }
    }
}

/// Why a call ended, carried on the `call_ended` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEndReason {
    ParticipantLeft,
    DurationLimit,
}

/// Participant metadata carried on `call_connected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallParticipant {
    pub user_id: String,
    pub display_name: String,
}

/// Which best-effort signaling variant is being relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDescKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Deterministic call room id: the two participant ids sorted
/// lexicographically and joined, so both sides derive the same id no matter
/// who initiates.
pub fn derive_room_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}-{}", a, b)
    } else {
        format!("{}-{}", b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_is_order_independent() {
        assert_eq!(derive_room_id("alice", "bob"), derive_room_id("bob", "alice"));
        assert_eq!(derive_room_id("alice", "bob"), "alice-bob");
        assert_eq!(derive_room_id("zed", "amy"), "amy-zed");
    }
}
