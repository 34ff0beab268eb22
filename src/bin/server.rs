//! weatherhub Aggregation Server Binary
//!
//! Opens the engine, starts the retention sweeper and serves TCP clients
//! until interrupted.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use weatherhub::network::{AggregationHandler, Server};
use weatherhub::{Config, Engine, RetentionSweeper, SyncStrategy};

/// weatherhub Aggregation Server
#[derive(Parser, Debug)]
#[command(name = "weatherhub-server")]
#[command(about = "Aggregates weather observations pushed by content servers")]
#[command(version)]
struct Args {
    /// Listen port (shorthand for 127.0.0.1:<port>)
    port: Option<u16>,

    /// Data directory
    #[arg(short, long, default_value = "./weatherhub_data")]
    data_dir: String,

    /// Listen address (host:port); overrides the port argument
    #[arg(short, long)]
    listen: Option<String>,

    /// Worker pool size (maximum concurrently served connections)
    #[arg(short, long, default_value = "10")]
    max_connections: usize,

    /// Observations retained per content server
    #[arg(long, default_value = "20")]
    history_capacity: usize,

    /// Seconds of silence after which a content server is evicted
    #[arg(long, default_value = "30")]
    stale_secs: u64,

    /// Seconds between retention sweeps
    #[arg(long, default_value = "15")]
    sweep_secs: u64,

    /// Skip fsync before replacing record files
    #[arg(long)]
    no_fsync: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,weatherhub=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let listen = args
        .listen
        .clone()
        .or_else(|| args.port.map(|port| format!("127.0.0.1:{}", port)))
        .unwrap_or_else(|| Config::default().listen_addr);

    tracing::info!("weatherhub Server v{}", weatherhub::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", listen);

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(listen)
        .max_connections(args.max_connections)
        .history_capacity(args.history_capacity)
        .staleness_threshold(Duration::from_secs(args.stale_secs))
        .sweep_interval(Duration::from_secs(args.sweep_secs))
        .sync_strategy(if args.no_fsync {
            SyncStrategy::OsBuffered
        } else {
            SyncStrategy::EveryWrite
        })
        .build();

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    let _sweeper = match RetentionSweeper::spawn(Arc::clone(&engine), config.sweep_interval) {
        Ok(sweeper) => sweeper,
        Err(e) => {
            tracing::error!("Failed to start retention sweeper: {}", e);
            std::process::exit(1);
        }
    };

    // Start server
    let handler = Arc::new(AggregationHandler::new(engine));
    let mut server = Server::new(config, handler);

    let handle = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Interrupt received, shutting down");
        handle.shutdown();
    }) {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
