//! Livestream signaling server binary.

use clap::Parser;
use livestream_signaling::config::{ConfigLoader, LogLevel, ServerConfig};
use livestream_signaling::logging;
use livestream_signaling::rooms::MemoryRoomManager;
use livestream_signaling::server::{ServerResult, SignalingServer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "livestream-signaling", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "SIGNALING_CONFIG", default_value = "signaling.toml")]
    config: PathBuf,

    /// Bind address, overriding the configuration.
    #[arg(long)]
    host: Option<String>,

    /// HTTP port, overriding the configuration.
    #[arg(short, long)]
    port: Option<u16>,

    /// Port for the raw WebSocket listener.
    #[arg(long)]
    websocket_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<LogLevel>,
}

impl Args {
    /// Load the configuration file and apply command line overrides.
    fn load_config(&self) -> ServerResult<ServerConfig> {
        let loader = ConfigLoader::with_defaults();
        let mut config = loader.load_or_default(&self.config)?;

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.websocket_port.is_some() {
            config.server.websocket_port = self.websocket_port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        loader.validate(&config)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = args.load_config()?;

    logging::init(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting livestream signaling server");

    let rooms = Arc::new(MemoryRoomManager::new());
    let mut server = SignalingServer::new(config, rooms);
    let addr = server.start().await?;
    info!(addr = %addr, "Listening");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    server.shutdown().await?;

    Ok(())
}
