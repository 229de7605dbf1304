//! Client - starts a trace and sends it through the gateway

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracehop::config::{Config, Role};
use tracehop::telemetry::{fatal, init_subscriber, shutdown_tracing};
use tracehop::ClientRunner;
use tracing::warn;

/// Client - issues one traced GET against the gateway and waits for export
#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file (environment variables otherwise)
    #[arg(short, long, env = "TRACEHOP_CONFIG")]
    config: Option<PathBuf>,

    /// Gateway URL, overriding GATEWAY_ENDPOINT and the configuration file
    #[arg(short, long)]
    url: Option<String>,

    /// Seconds to wait for span export before exiting
    #[arg(short, long)]
    wait: Option<u64>,

    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    }
    .unwrap_or_else(|e| fatal("Failed to load configuration", &e));

    if let Some(url) = args.url {
        config.client.gateway_url = url;
    }
    if let Some(wait) = args.wait {
        config.client.export_wait_seconds = wait;
    }
    if let Err(e) = config.validate_for(Role::Client) {
        fatal("Invalid configuration", &e);
    }

    let guard = init_subscriber(&config.telemetry, Role::Client, &args.log_level)
        .unwrap_or_else(|e| fatal("Failed to register tracer provider", &e));

    let runner = ClientRunner::new(guard.tracer(), &config.client.gateway_url)?;
    let body = match runner.retrieve_response().await {
        Ok(body) => body,
        Err(e) => {
            // Keep the failed trace
            if let Err(e) = shutdown_tracing(guard) {
                warn!(error = %e, "Failed to flush spans on shutdown");
            }
            fatal("Failed to retrieve response", &e);
        }
    };

    println!("Response Received: {}", body);
    println!("Waiting for few seconds to export spans ...");
    tokio::time::sleep(Duration::from_secs(config.client.export_wait_seconds)).await;
    println!("Inspect traces on stdout");

    if let Err(e) = shutdown_tracing(guard) {
        fatal("Error shutting down tracer provider", &e);
    }

    Ok(())
}
