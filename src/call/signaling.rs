//! Signaling relay: forwards opaque WebRTC negotiation payloads between the
//! two parties of a call. The generic `webrtc_signal` path always verifies
//! the parties share an active call room; the offer/answer/ICE variants are
//! best-effort by default so the initial handshake can run while the room
//! is being established (`strict_signaling` opts into the room check there
//! too).

use chrono::Utc;
use serde_json::Value;

use crate::call::{CallError, SessionDescKind};
use crate::state::AppState;
use crate::ws::broadcast::send_event;
use crate::ws::protocol::{HandlerResult, ServerEvent};

/// Room-checked relay of a generic signaling payload. The payload itself is
/// forwarded unmodified; relay metadata rides alongside it.
pub fn relay_signal(
    state: &AppState,
    from_id: &str,
    from_name: &str,
    target_id: &str,
    signal: Value,
) -> HandlerResult {
    let target = state
        .registry
        .resolve(target_id)
        .ok_or_else(|| CallError::Signal("Receiver not found".to_string()))?;

    let call = state
        .calls
        .shared_call(from_id, target_id)
        .ok_or_else(|| CallError::Signal("No active call with this user".to_string()))?;

    send_event(
        &target.sender,
        None,
        &ServerEvent::WebrtcSignal {
            from: from_id.to_string(),
            from_name: from_name.to_string(),
            room_id: call.room_id.clone(),
            timestamp: Utc::now(),
            signal,
        },
    );
    Ok(None)
}

/// Relay an offer, answer, or ICE candidate to the target with the sender's
/// id attached.
pub fn relay_session_desc(
    state: &AppState,
    from_id: &str,
    target_id: &str,
    kind: SessionDescKind,
    payload: Value,
) -> HandlerResult {
    if state.strict_signaling && state.calls.shared_call(from_id, target_id).is_none() {
        return Err(CallError::Signal("No active call with this user".to_string()).into());
    }

    let target = state
        .registry
        .resolve(target_id)
        .ok_or_else(|| CallError::Signal("Receiver not found".to_string()))?;

    let from = from_id.to_string();
    let event = match kind {
        SessionDescKind::Offer => ServerEvent::WebrtcOffer { from, sdp: payload },
        SessionDescKind::Answer => ServerEvent::WebrtcAnswer { from, sdp: payload },
        SessionDescKind::IceCandidate => ServerEvent::WebrtcIceCandidate {
            from,
            candidate: payload,
        },
    };
    send_event(&target.sender, None, &event);
    Ok(None)
}
