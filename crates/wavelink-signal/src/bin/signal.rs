//! Wavelink Signal Server
//!
//! Two-party signaling broker for direct call setup.
//!
//! # Usage
//!
//! ```bash
//! # WebSocket mode (default)
//! wavelink-signal --port 8080
//!
//! # HTTP polling mode for request/response-only environments
//! wavelink-signal --mode poll --port 3000
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wavelink_core::Config;
use wavelink_signal::{poll, RoomStore, SignalServer};

#[derive(Parser, Debug)]
#[command(name = "wavelink-signal")]
#[command(about = "Wavelink signaling server for two-party call setup")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Config file path (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport mode
    #[arg(short, long, value_enum, default_value_t = Mode::Websocket)]
    mode: Mode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Persistent WebSocket connections with heartbeat liveness
    Websocket,
    /// Request/response polling with inactivity expiry
    Poll,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let bind = match &args.bind {
        Some(bind) => bind.parse()?,
        None => config.server.bind,
    };
    let port = args.port.unwrap_or(config.server.port);
    let addr = SocketAddr::new(bind, port);

    info!("Starting Wavelink Signal Server");

    match args.mode {
        Mode::Websocket => {
            let heartbeat = Duration::from_secs(config.heartbeat.interval_secs);
            let server = SignalServer::new(heartbeat);
            server.serve(addr).await?;
        }
        Mode::Poll => {
            let rooms = Arc::new(RoomStore::new());
            poll::serve(addr, rooms, config.poll).await?;
        }
    }

    Ok(())
}
