//! Dax Server Binary
//!
//! Starts the cache server.

use std::sync::Arc;
use clap::Parser;
use dax::{Config, Engine, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// Dax cache server
#[derive(Parser, Debug)]
#[command(name = "dax-server")]
#[command(about = "In-memory key-value cache server")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Per-connection read buffer in KB
    #[arg(short, long, default_value = "1024")]
    buffer_kb: usize,

    /// Write timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    write_timeout_ms: u64,

    /// Reads one connection gets per loop turn
    #[arg(long, default_value = "16")]
    reads_per_turn: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dax=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Dax Server v{}", dax::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .read_buffer_size(args.buffer_kb * 1024)
        .write_timeout_ms(args.write_timeout_ms)
        .reads_per_turn(args.reads_per_turn)
        .build();

    let engine = Arc::new(Engine::new());

    let mut server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
