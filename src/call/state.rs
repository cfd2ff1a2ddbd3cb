//! In-memory call state: pending (unanswered) call requests keyed by
//! caller, and active calls indexed by participant and by room.
//!
//! Call admission is a single compare-and-insert under one lock, keyed by
//! participant identity. Two accepts naming overlapping participants can
//! interleave at await points elsewhere, but only one of them can win the
//! insert, which upholds the one-active-call-per-user invariant.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::call::derive_room_id;

/// A time-bounded call proposal awaiting accept/reject. Owned solely by the
/// caller: only the caller's disconnect, the callee's answer, or timeout
/// expiry may destroy it.
#[derive(Debug)]
pub struct PendingCall {
    /// Token matched by the timeout task, so a stale timer cannot clear a
    /// newer request from the same caller.
    pub token: u64,
    pub callee_id: String,
    pub created_at: DateTime<Utc>,
    pub timeout: JoinHandle<()>,
}

impl PendingCall {
    /// Cancel the pending timeout. Each request has at most one live
    /// timeout handle; consuming the request kills it.
    pub fn cancel_timeout(&self) {
        self.timeout.abort();
    }
}

/// An established two-party call. Strictly dyadic.
#[derive(Debug)]
pub struct ActiveCall {
    pub room_id: String,
    pub participants: [String; 2],
    pub started_at: DateTime<Utc>,
    /// Max-duration timer; cancelled on explicit end, idempotent if it
    /// fires after teardown already happened.
    pub timer: Mutex<Option<JoinHandle<()>>>,
}

impl ActiveCall {
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| *p != user_id)
            .map(|p| p.as_str())
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    pub fn set_timer(&self, handle: JoinHandle<()>) {
        let mut slot = self.timer.lock().expect("call timer lock");
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    pub fn cancel_timer(&self) {
        if let Some(handle) = self.timer.lock().expect("call timer lock").take() {
            handle.abort();
        }
    }
}

#[derive(Default)]
struct ActiveCalls {
    by_user: HashMap<String, Arc<ActiveCall>>,
    by_room: HashMap<String, Arc<ActiveCall>>,
}

#[derive(Clone, Default)]
pub struct CallStore {
    pending: Arc<DashMap<String, PendingCall>>,
    active: Arc<Mutex<ActiveCalls>>,
    next_token: Arc<AtomicU64>,
}

impl CallStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a pending request for a caller. A previous pending request
    /// from the same caller is replaced and its timeout cancelled.
    pub fn insert_pending(&self, caller_id: &str, pending: PendingCall) {
        if let Some(replaced) = self.pending.insert(caller_id.to_string(), pending) {
            replaced.cancel_timeout();
        }
    }

    /// Consume a caller's pending request, cancelling its timeout.
    pub fn take_pending(&self, caller_id: &str) -> Option<PendingCall> {
        let (_, pending) = self.pending.remove(caller_id)?;
        pending.cancel_timeout();
        Some(pending)
    }

    /// Remove a caller's pending request only if the token still matches.
    /// Used by the timeout task so it cannot clear a newer request.
    pub fn expire_pending(&self, caller_id: &str, token: u64) -> Option<PendingCall> {
        self.pending
            .remove_if(caller_id, |_, p| p.token == token)
            .map(|(_, p)| p)
    }

    /// Pending requests directed at a callee, consumed. Used when the
    /// callee disconnects.
    pub fn take_pending_to(&self, callee_id: &str) -> Vec<(String, PendingCall)> {
        let callers: Vec<String> = self
            .pending
            .iter()
            .filter(|e| e.value().callee_id == callee_id)
            .map(|e| e.key().clone())
            .collect();
        callers
            .into_iter()
            .filter_map(|caller| self.take_pending(&caller).map(|p| (caller, p)))
            .collect()
    }

    pub fn is_busy(&self, user_id: &str) -> bool {
        self.active
            .lock()
            .expect("active call lock")
            .by_user
            .contains_key(user_id)
    }

    /// Atomic call admission: insert an active call for both participants,
    /// rejected if either already has any entry. The room index is checked
    /// too: ids containing the separator can make distinct pairs derive the
    /// same room id, and an overwrite there would strand the first call's
    /// participant entries. Returns None on conflict.
    pub fn admit(&self, a: &str, b: &str) -> Option<Arc<ActiveCall>> {
        let room_id = derive_room_id(a, b);
        let mut active = self.active.lock().expect("active call lock");
        if active.by_user.contains_key(a)
            || active.by_user.contains_key(b)
            || active.by_room.contains_key(&room_id)
        {
            return None;
        }

        let call = Arc::new(ActiveCall {
            room_id,
            participants: [a.to_string(), b.to_string()],
            started_at: Utc::now(),
            timer: Mutex::new(None),
        });
        active.by_user.insert(a.to_string(), call.clone());
        active.by_user.insert(b.to_string(), call.clone());
        active.by_room.insert(call.room_id.clone(), call.clone());
        Some(call)
    }

    pub fn by_room(&self, room_id: &str) -> Option<Arc<ActiveCall>> {
        self.active
            .lock()
            .expect("active call lock")
            .by_room
            .get(room_id)
            .cloned()
    }

    pub fn call_of(&self, user_id: &str) -> Option<Arc<ActiveCall>> {
        self.active
            .lock()
            .expect("active call lock")
            .by_user
            .get(user_id)
            .cloned()
    }

    /// The active call both users share, if any.
    pub fn shared_call(&self, a: &str, b: &str) -> Option<Arc<ActiveCall>> {
        self.call_of(a).filter(|call| call.has_participant(b))
    }

    /// Tear an active call out of every index. Idempotent: the second
    /// remover gets None and must do nothing.
    pub fn remove(&self, room_id: &str) -> Option<Arc<ActiveCall>> {
        let mut active = self.active.lock().expect("active call lock");
        let call = active.by_room.remove(room_id)?;
        for participant in &call.participants {
            active.by_user.remove(participant);
        }
        Some(call)
    }
}
