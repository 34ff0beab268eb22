//! weatherhub GET Client Binary
//!
//! Fetches the latest observation for a station (or overall) and prints it.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use weatherhub::Client;

/// weatherhub GET Client
#[derive(Parser, Debug)]
#[command(name = "weatherhub-get")]
#[command(about = "Read the latest weather observation from a weatherhub server")]
#[command(version)]
struct Args {
    /// Aggregation server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4567")]
    server: String,

    /// Station id (latest overall if omitted)
    station: Option<String>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,weatherhub=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let mut client = Client::new(&args.server);

    match client.get_latest(args.station.as_deref()) {
        Ok(response) if response.is_success() => {
            println!("{}", response.body_text());
        }
        Ok(response) => {
            eprintln!("{} {}: {}", response.status, response.reason, response.body_text());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
