use axum::{routing::get, Router};

use crate::presence;
use crate::state::AppState;
use crate::ws;

/// Assemble the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::handler::ws_upgrade))
        .route("/api/presence", get(presence::get_presence))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}
