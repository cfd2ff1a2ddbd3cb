//! Call negotiation state machine: request → accept/reject → active → ended,
//! with request timeout, max-duration enforcement, and disconnect cascades.

use std::sync::Arc;

use chrono::Utc;

use crate::call::state::{ActiveCall, PendingCall};
use crate::call::{CallEndReason, CallError, CallParticipant};
use crate::notify::{Notification, NotificationKind};
use crate::state::AppState;
use crate::ws::broadcast::send_to_user;
use crate::ws::protocol::{HandlerError, HandlerResult, ServerEvent};

/// Start a call: offline/busy checks, pending request with timeout, and an
/// `incoming_call` to the callee.
pub fn request_call(
    state: &AppState,
    caller_id: &str,
    caller_name: &str,
    callee_id: &str,
) -> HandlerResult {
    if caller_id == callee_id {
        return Err(HandlerError::Invalid("Cannot call yourself".to_string()));
    }
    if !state.registry.is_online(callee_id) {
        return Err(CallError::UserOffline.into());
    }
    if state.calls.is_busy(callee_id) {
        return Err(CallError::UserBusy.into());
    }
    if state.calls.is_busy(caller_id) {
        return Err(CallError::CallerBusy.into());
    }

    let token = state.calls.next_token();
    let timeout = {
        let state = state.clone();
        let caller_id = caller_id.to_string();
        let callee_id = callee_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(state.call_request_timeout).await;
            // Only fires if the request is still the live one; accept,
            // reject, and disconnect all consume it first.
            if state.calls.expire_pending(&caller_id, token).is_some() {
                tracing::debug!(caller_id = %caller_id, callee_id = %callee_id, "Call request timed out");
                send_to_user(
                    &state.registry,
                    &caller_id,
                    &ServerEvent::CallRejected {
                        rejecter_id: callee_id,
                        reason: Some("Call request timed out".to_string()),
                    },
                );
            }
        })
    };

    state.calls.insert_pending(
        caller_id,
        PendingCall {
            token,
            callee_id: callee_id.to_string(),
            created_at: Utc::now(),
            timeout,
        },
    );

    send_to_user(
        &state.registry,
        callee_id,
        &ServerEvent::IncomingCall {
            caller_id: caller_id.to_string(),
            caller_name: caller_name.to_string(),
        },
    );
    state.notifier.enqueue(Notification {
        recipient_id: callee_id.to_string(),
        kind: NotificationKind::IncomingCall,
        body: format!("Incoming call from {}", caller_name),
    });

    Ok(None)
}

/// Accept a pending call. Admission is one atomic compare-and-insert on the
/// active-call map: both busy checks and the insert happen under a single
/// lock, so two racing accepts cannot both establish a call.
pub fn accept_call(
    state: &AppState,
    accepter_id: &str,
    accepter_name: &str,
    caller_id: &str,
) -> HandlerResult {
    let caller = state
        .registry
        .resolve(caller_id)
        .ok_or(CallError::CallerUnavailable)?;

    // Cancel the request timeout before anything else
    state.calls.take_pending(caller_id);

    let call = state
        .calls
        .admit(accepter_id, caller_id)
        .ok_or(CallError::UserBusy)?;

    state.rooms.join(&call.room_id, caller_id);
    state.rooms.join(&call.room_id, accepter_id);
    schedule_duration_limit(state, &call);

    let connected = ServerEvent::CallConnected {
        room_id: call.room_id.clone(),
        started_at: call.started_at,
        participants: vec![
            CallParticipant {
                user_id: caller_id.to_string(),
                display_name: caller.display_name,
            },
            CallParticipant {
                user_id: accepter_id.to_string(),
                display_name: accepter_name.to_string(),
            },
        ],
    };
    send_to_user(&state.registry, caller_id, &connected);
    send_to_user(&state.registry, accepter_id, &connected);

    tracing::info!(
        room_id = %call.room_id,
        caller_id = %caller_id,
        accepter_id = %accepter_id,
        "Call connected"
    );
    Ok(None)
}

/// Reject a pending call: cancel its timeout and tell the caller only.
pub fn reject_call(
    state: &AppState,
    rejecter_id: &str,
    caller_id: &str,
    reason: Option<String>,
) -> HandlerResult {
    state.calls.take_pending(caller_id);
    send_to_user(
        &state.registry,
        caller_id,
        &ServerEvent::CallRejected {
            rejecter_id: rejecter_id.to_string(),
            reason,
        },
    );
    Ok(None)
}

/// Explicit hangup by a participant.
pub fn end_call(state: &AppState, ender_id: &str, room_id: &str) -> HandlerResult {
    let call = state
        .calls
        .by_room(room_id)
        .ok_or_else(|| CallError::EndCall("Unknown call room".to_string()))?;
    if !call.has_participant(ender_id) {
        return Err(CallError::EndCall("Not a call participant".to_string()).into());
    }

    teardown(state, room_id, CallEndReason::ParticipantLeft);
    Ok(None)
}

/// Destroy an active call and notify its participants. Idempotent: the
/// max-duration timer and an explicit end can race; whoever removes the
/// call from the store does the work, the other is a no-op.
pub fn teardown(state: &AppState, room_id: &str, reason: CallEndReason) -> bool {
    let Some(call) = state.calls.remove(room_id) else {
        return false;
    };
    call.cancel_timer();

    let event = ServerEvent::CallEnded {
        room_id: room_id.to_string(),
        reason,
    };
    for participant in &call.participants {
        send_to_user(&state.registry, participant, &event);
        state.rooms.leave(room_id, participant);
    }

    tracing::info!(room_id = %room_id, reason = ?reason, "Call ended");
    true
}

fn schedule_duration_limit(state: &AppState, call: &Arc<ActiveCall>) {
    let handle = {
        let state = state.clone();
        let room_id = call.room_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(state.call_max_duration).await;
            teardown(&state, &room_id, CallEndReason::DurationLimit);
        })
    };
    call.set_timer(handle);
}

/// Cleanup cascade for a user whose connection went away. Disconnection is
/// the universal cancellation signal for all per-user pending/active state.
pub fn disconnect_cascade(state: &AppState, user_id: &str) {
    // Their own outstanding request dies quietly
    state.calls.take_pending(user_id);

    // Requests ringing at them bounce back to the caller
    for (caller_id, _) in state.calls.take_pending_to(user_id) {
        send_to_user(
            &state.registry,
            &caller_id,
            &ServerEvent::CallRejected {
                rejecter_id: user_id.to_string(),
                reason: Some("User disconnected".to_string()),
            },
        );
    }

    // An active call ends for the remaining participant
    if let Some(call) = state.calls.call_of(user_id) {
        teardown(state, &call.room_id, CallEndReason::ParticipantLeft);
    }

    // Drop out of every chat room; empty rooms are deleted
    state.rooms.leave_all(user_id);
}
