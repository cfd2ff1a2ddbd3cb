//! Shared helpers for unit tests: an assembled `AppState` and fake
//! connections backed by raw channels, so handlers can be exercised
//! without a listening server.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use crate::chat::MemoryChatStore;
use crate::config::Config;
use crate::notify::{LogSink, NotificationBridge};
use crate::state::AppState;
use crate::ws::protocol::ServerEnvelope;

pub struct TestCtx {
    pub state: AppState,
    pub store: Arc<MemoryChatStore>,
}

/// Build an `AppState` with in-memory collaborators. Must run inside a
/// tokio runtime (the notification worker is spawned).
pub fn test_ctx() -> TestCtx {
    let store = Arc::new(MemoryChatStore::new());
    let notifier = NotificationBridge::spawn(Arc::new(LogSink), 16);
    let state = AppState::new(
        &Config::default(),
        store.clone(),
        notifier,
        vec![0u8; 32],
    );
    TestCtx { state, store }
}

/// Register a fake connection for a user and return the receiving end of
/// its outbound channel.
pub fn connect(state: &AppState, user_id: &str, display_name: &str) -> mpsc::UnboundedReceiver<Message> {
    let (tx, rx) = mpsc::unbounded_channel();
    state.registry.register(user_id, display_name, tx);
    rx
}

/// Pop the next queued event for a connection, decoded. Panics if the
/// queue is empty or the frame is not a JSON event.
pub fn expect_event(rx: &mut mpsc::UnboundedReceiver<Message>) -> ServerEnvelope {
    match rx.try_recv() {
        Ok(Message::Text(text)) => {
            serde_json::from_str(&text).expect("server frame should decode")
        }
        Ok(other) => panic!("expected text frame, got {:?}", other),
        Err(_) => panic!("expected an event but the queue is empty"),
    }
}

/// Assert a connection has no queued events.
pub fn no_event(rx: &mut mpsc::UnboundedReceiver<Message>) {
    if let Ok(msg) = rx.try_recv() {
        panic!("expected no event, got {:?}", msg);
    }
}

/// Let spawned timer tasks run after advancing a paused clock.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
