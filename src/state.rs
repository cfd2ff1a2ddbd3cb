use std::sync::Arc;
use std::time::Duration;

use crate::call::state::CallStore;
use crate::chat::ChatStore;
use crate::config::Config;
use crate::notify::NotificationBridge;
use crate::presence::ConnectionRegistry;
use crate::rooms::RoomStore;

/// Shared application state passed to all handlers via the axum State
/// extractor. One process owns all connection state.
#[derive(Clone)]
pub struct AppState {
    /// Live WebSocket connection per user
    pub registry: ConnectionRegistry,
    /// Chat and call fanout rooms
    pub rooms: RoomStore,
    /// Pending call requests and active calls
    pub calls: CallStore,
    /// External message/participant store
    pub chat_store: Arc<dyn ChatStore>,
    /// Best-effort notification dispatch
    pub notifier: NotificationBridge,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// How long a call request may ring before timing out
    pub call_request_timeout: Duration,
    /// Forced teardown after this call duration
    pub call_max_duration: Duration,
    /// Room-check offer/answer/ICE relay like the generic signal path
    pub strict_signaling: bool,
}

impl AppState {
    pub fn new(
        config: &Config,
        chat_store: Arc<dyn ChatStore>,
        notifier: NotificationBridge,
        jwt_secret: Vec<u8>,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomStore::new(),
            calls: CallStore::new(),
            chat_store,
            notifier,
            jwt_secret,
            call_request_timeout: Duration::from_secs(config.call_request_timeout_secs),
            call_max_duration: Duration::from_secs(config.call_max_duration_secs),
            strict_signaling: config.strict_signaling,
        }
    }
}
