//! Hornfield server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate (development)
//! hornfield-server --bind 0.0.0.0:4433
//!
//! # Start with TLS certificate, trusting clients to check move shapes
//! hornfield-server --cert cert.pem --key key.pem --move-policy occupancy
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use hornfield_core::MovePolicy;
use hornfield_server::{DriverConfig, RetentionPolicy, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Hornfield match server
#[derive(Parser, Debug)]
#[command(name = "hornfield-server")]
#[command(about = "Authoritative server for two-player Hornfield matches")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:4433")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long, requires = "key")]
    cert: Option<PathBuf>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long, requires = "cert")]
    key: Option<PathBuf>,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Move validation: geometry (shape and occupancy) or occupancy only
    #[arg(long, default_value = "geometry")]
    move_policy: MovePolicy,

    /// Seconds to keep a finished room (0 keeps it forever)
    #[arg(long, default_value = "300")]
    ended_ttl_secs: u64,

    /// Seconds without a join or move before a room is dropped (0 disables)
    #[arg(long, default_value = "3600")]
    idle_ttl_secs: u64,

    /// Milliseconds between retention sweeps
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Hornfield server starting");
    tracing::info!("Move policy: {}", args.move_policy);

    if args.cert.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        cert_path: args.cert,
        key_path: args.key,
        tick_interval: Duration::from_millis(args.tick_ms),
        driver: DriverConfig {
            max_connections: args.max_connections,
            move_policy: args.move_policy,
            retention: RetentionPolicy::from_secs(args.ended_ttl_secs, args.idle_ttl_secs),
        },
    };

    let server = Server::bind(config)?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
