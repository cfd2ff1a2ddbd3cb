use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use clubhub_server::auth;
use clubhub_server::chat::MemoryChatStore;
use clubhub_server::config::{generate_config_template, Config};
use clubhub_server::notify::{LogSink, NotificationBridge};
use clubhub_server::routes;
use clubhub_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "clubhub_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "clubhub_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("ClubHub realtime server v{} starting", env!("CARGO_PKG_VERSION"));

    // Load or generate JWT signing key (256-bit random, stored in data_dir)
    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    // Single-process defaults: in-memory chat store, log-only notifications.
    // Both sit behind traits so a distributed backing store or a real
    // notification service can be swapped in.
    let chat_store = Arc::new(MemoryChatStore::new());
    let notifier = NotificationBridge::spawn(Arc::new(LogSink), config.notify_queue_depth);

    let app_state = AppState::new(&config, chat_store, notifier, jwt_secret);
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
