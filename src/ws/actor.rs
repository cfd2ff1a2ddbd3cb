use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::call::negotiation;
use crate::state::AppState;
use crate::ws::broadcast::{broadcast_to_all, send_event};
use crate::ws::protocol::{self, ServerEvent};

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Close code sent to a connection displaced by a newer login.
const CLOSE_REPLACED: u16 = 4000;

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming messages, dispatches to protocol handlers
///
/// The mpsc channel allows any part of the system to send messages to this
/// client by cloning the sender.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    user_id: String,
    display_name: String,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Register in the connection registry; last connection wins
    let (conn_id, replaced) = state.registry.register(&user_id, &display_name, tx.clone());
    if let Some(old) = replaced {
        tracing::info!(user_id = %user_id, "Displacing previous connection");
        let _ = old.sender.send(Message::Close(Some(CloseFrame {
            code: CLOSE_REPLACED,
            reason: "Replaced by newer connection".into(),
        })));
    }

    // Everyone hears the user come online; the new client gets the snapshot
    broadcast_to_all(
        &state.registry,
        &ServerEvent::UserOnline {
            user_id: user_id.clone(),
            display_name: display_name.clone(),
        },
    );
    send_event(
        &tx,
        None,
        &ServerEvent::OnlineUsers {
            users: state.registry.list_online(),
        },
    );

    tracing::info!(user_id = %user_id, conn_id = conn_id, "WebSocket actor started");

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(&text, &tx, &state, &user_id, &display_name)
                        .await;
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        user_id = %user_id,
                        "Received binary message (expected JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(user_id = %user_id, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(user_id = %user_id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // Presence and call/room state only unwind if this was still the live
    // connection; a displaced connection must not evict its successor.
    if state.registry.unregister(&user_id, conn_id) {
        broadcast_to_all(
            &state.registry,
            &ServerEvent::UserOffline {
                user_id: user_id.clone(),
            },
        );
        negotiation::disconnect_cascade(&state, &user_id);
    }

    tracing::info!(user_id = %user_id, conn_id = conn_id, "WebSocket actor stopped");
}

/// Writer task: receives messages from the mpsc channel and forwards them
/// to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
