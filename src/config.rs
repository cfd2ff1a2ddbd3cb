use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// ClubHub realtime server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "clubhub-server", version, about = "ClubHub realtime server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "CLUBHUB_PORT", default_value = "4100")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "CLUBHUB_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./clubhub.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "CLUBHUB_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (JWT signing key)
    #[arg(long, env = "CLUBHUB_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Seconds a call request may stay unanswered before timing out
    #[arg(long, env = "CLUBHUB_CALL_REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub call_request_timeout_secs: u64,

    /// Maximum call duration in seconds before forced teardown
    #[arg(long, env = "CLUBHUB_CALL_MAX_DURATION_SECS", default_value = "3600")]
    pub call_max_duration_secs: u64,

    /// Require an active call room for offer/answer/ICE relay
    /// (the generic signal path is always room-checked)
    #[arg(long, env = "CLUBHUB_STRICT_SIGNALING")]
    pub strict_signaling: bool,

    /// Capacity of the notification dispatch queue
    #[arg(long, env = "CLUBHUB_NOTIFY_QUEUE_DEPTH", default_value = "256")]
    pub notify_queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4100,
            bind_address: "0.0.0.0".to_string(),
            config: "./clubhub.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            call_request_timeout_secs: 30,
            call_max_duration_secs: 3600,
            strict_signaling: false,
            notify_queue_depth: 256,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (CLUBHUB_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("CLUBHUB_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# ClubHub Realtime Server Configuration
# Place this file at ./clubhub.toml or specify with --config <path>
# All settings can be overridden via environment variables (CLUBHUB_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 4100)
# port = 4100

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the JWT signing key
# data_dir = "./data"

# Seconds a call request may stay unanswered before the caller is
# notified of a timeout (default: 30)
# call_request_timeout_secs = 30

# Maximum call duration in seconds before both parties are disconnected
# (default: 3600 = 1 hour)
# call_max_duration_secs = 3600

# Require both parties to share an active call room before relaying
# webrtc_offer / webrtc_answer / webrtc_ice_candidate. The generic
# webrtc_signal path is always room-checked. Default: false, so the
# offer/answer handshake can run while the call room is being set up.
# strict_signaling = false

# Capacity of the best-effort notification dispatch queue (default: 256)
# notify_queue_depth = 256
"#
    .to_string()
}
