//! Shared setup for the integration tests: a real server on an ephemeral
//! port plus small helpers for speaking the JSON event protocol over
//! tokio-tungstenite.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use clubhub_server::auth::jwt;
use clubhub_server::chat::MemoryChatStore;
use clubhub_server::config::Config;
use clubhub_server::notify::{LogSink, NotificationBridge};
use clubhub_server::routes;
use clubhub_server::state::AppState;

pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub jwt_secret: Vec<u8>,
    pub store: Arc<MemoryChatStore>,
}

/// Start the server on a random port with an in-memory chat store.
pub async fn start_test_server() -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let jwt_secret =
        jwt::load_or_generate_jwt_secret(&data_dir).expect("Failed to generate JWT secret");
    let store = Arc::new(MemoryChatStore::new());
    let notifier = NotificationBridge::spawn(Arc::new(LogSink), 64);

    let state = AppState::new(&Config::default(), store.clone(), notifier, jwt_secret.clone());
    let app = routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    TestServer {
        addr,
        jwt_secret,
        store,
    }
}

pub fn token_for(server: &TestServer, user_id: &str, display_name: &str) -> String {
    jwt::issue_access_token(&server.jwt_secret, user_id, display_name, 900)
        .expect("Failed to issue token")
}

/// Connect a user over WebSocket with a freshly issued token.
pub async fn connect_user(
    server: &TestServer,
    user_id: &str,
    display_name: &str,
) -> (WsWriter, WsReader) {
    let token = token_for(server, user_id, display_name);
    let ws_url = format!("ws://{}/ws?token={}", server.addr, token);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream.split()
}

/// Send one JSON event frame.
pub async fn send_frame(write: &mut WsWriter, frame: Value) {
    write
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("Failed to send frame");
}

/// Read frames until one with the given `event` tag arrives, skipping
/// everything else (presence broadcasts, pings). Panics on timeout.
pub async fn wait_for_event(read: &mut WsReader, event: &str) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for {} event", event))
            .expect("Stream ended unexpectedly")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                let frame: Value =
                    serde_json::from_str(&text).expect("Server frame should be JSON");
                if frame["event"] == event {
                    return frame;
                }
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame while waiting for {}: {:?}", event, other),
        }
    }
}

/// Assert the connection stays quiet (ignoring pings) for a short window.
pub async fn expect_silence(read: &mut WsReader) {
    loop {
        match tokio::time::timeout(Duration::from_millis(300), read.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
            Ok(other) => panic!("Expected silence, got: {:?}", other),
        }
    }
}
