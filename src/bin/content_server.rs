//! weatherhub Content Server Binary
//!
//! Pushes weather files to an aggregation server, keeps the source alive with
//! heartbeats (resubmitting its last file if the server has evicted it), and
//! announces its departure on exit.

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use weatherhub::protocol::{headers, status};
use weatherhub::{Client, SourceId};

/// weatherhub Content Server
#[derive(Parser, Debug)]
#[command(name = "weatherhub-content")]
#[command(about = "Push weather observations to a weatherhub aggregation server")]
#[command(version)]
struct Args {
    /// Aggregation server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4567")]
    server: String,

    /// Weather files to submit (JSON object or `key: value` lines)
    #[arg(required = true)]
    files: Vec<String>,

    /// Source id to submit as (random if omitted)
    #[arg(long)]
    source_id: Option<String>,

    /// Seconds between heartbeats
    #[arg(long, default_value = "10")]
    heartbeat_secs: u64,

    /// Seconds to stay alive after submitting before shutting down
    #[arg(long, default_value = "30")]
    linger_secs: u64,
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

    let source_id = match args.source_id.as_deref().map(SourceId::parse) {
        Some(Ok(id)) => id,
        Some(Err(e)) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
        None => SourceId::new_random(),
    };

    tracing::info!("Content server {} -> {}", source_id, args.server);

    let mut client = Client::new(&args.server);
    let mut last_submitted: Option<(Bytes, &'static str)> = None;

    for path in &args.files {
        let body = match fs::read(path) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                tracing::error!("Failed to read {}: {}", path, e);
                std::process::exit(1);
            }
        };
        let content_type = if body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
            headers::APPLICATION_JSON
        } else {
            headers::TEXT_PLAIN
        };

        match client.put_observation(source_id, body.clone(), content_type) {
            Ok(response) => {
                tracing::info!("{} -> {} {}", path, response.status, response.body_text());
                last_submitted = Some((body, content_type));
            }
            Err(e) => {
                tracing::error!("Failed to submit {}: {}", path, e);
                std::process::exit(1);
            }
        }
    }

    let heartbeat = Duration::from_secs(args.heartbeat_secs.max(1));
    let deadline = Instant::now() + Duration::from_secs(args.linger_secs);
    while Instant::now() + heartbeat <= deadline {
        thread::sleep(heartbeat);
        match client.heartbeat(source_id) {
            Ok(response) if response.is_success() => tracing::debug!("Heartbeat acknowledged"),
            Ok(response) if response.status == status::NOT_FOUND => {
                // Evicted by the server: push the data again to re-register
                tracing::warn!("Server no longer knows this source, resubmitting");
                if let Some((body, content_type)) = &last_submitted {
                    match client.put_observation(source_id, body.clone(), content_type) {
                        Ok(response) => tracing::info!(
                            "Resubmitted -> {} {}",
                            response.status,
                            response.body_text()
                        ),
                        Err(e) => tracing::warn!("Resubmit failed: {}", e),
                    }
                }
            }
            Ok(response) => tracing::warn!("Heartbeat rejected: {}", response.status),
            Err(e) => tracing::warn!("Heartbeat failed: {}", e),
        }
    }

    match client.shutdown(source_id) {
        Ok(response) => tracing::info!("Shutdown -> {} {}", response.status, response.body_text()),
        Err(e) => tracing::warn!("Shutdown notice failed: {}", e),
    }
}
