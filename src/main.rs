//! Line echo server.
//!
//! Hosts the engine with the reference [`EchoProtocol`]: every client gets
//! back the first line it sends, then the connection is closed.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────┐
//!                   │                 ASYNC SERVER                  │
//!                   │                                               │
//!   Client ─────────┼─▶ net::listener ──▶ server::dispatcher        │
//!                   │    accept loop       Accept/Receive/Send ──┐  │
//!                   │                            ▲               │  │
//!                   │                            │   Verdict     ▼  │
//!                   │                       protocol::Handler ◀──┘  │
//!                   │                                               │
//!                   │   lifecycle: signal ─▶ stop ─▶ drain ─▶ close  │
//!                   └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use async_server::config::{load_config, validate_config, ConfigError, ServerConfig};
use async_server::lifecycle::signals::shutdown_signal;
use async_server::observability::{logging, metrics};
use async_server::{EchoProtocol, Server};

#[derive(Parser)]
#[command(name = "async-server")]
#[command(about = "Asynchronous line echo server", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address (e.g. 127.0.0.1:13000).
    #[arg(short, long)]
    bind: Option<String>,

    /// Override observability.log_level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability);
    tracing::info!("async-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backlog = config.listener.backlog,
        max_buffer_bytes = config.buffer.max_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = Server::new(config, EchoProtocol);
    let local_addr = server.start_configured().await?;
    tracing::info!(address = %local_addr, "Listening for connections");

    shutdown_signal().await;
    server.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
