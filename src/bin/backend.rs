//! Backend service - answers /hello inside the caller's trace

use clap::Parser;
use std::path::PathBuf;
use tracehop::config::{with_port, Config, Role};
use tracehop::server::HttpServer;
use tracehop::telemetry::{fatal, init_subscriber, shutdown_tracing};
use tracehop::BackendService;
use tracing::info;

/// Backend service - continues the incoming trace and replies "Hello, world!"
#[derive(Parser, Debug)]
#[command(name = "backend")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file (environment variables otherwise)
    #[arg(short, long, env = "TRACEHOP_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configured address
    #[arg(short, long)]
    port: Option<u16>,

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

    if let Some(port) = args.port {
        config.backend.address = with_port(&config.backend.address, port);
    }
    if let Err(e) = config.validate_for(Role::Backend) {
        fatal("Invalid configuration", &e);
    }

    let guard = init_subscriber(&config.telemetry, Role::Backend, &args.log_level)
        .unwrap_or_else(|e| fatal("Failed to register tracer provider", &e));

    info!(
        version = tracehop::VERSION,
        format = %guard.format(),
        "Starting backend"
    );

    let server = HttpServer::bind(&config.backend.address, BackendService::new(guard.tracer()))
        .await
        .unwrap_or_else(|e| fatal("Failed to launch server", &e));
    if let Err(e) = server.run().await {
        fatal("Failed to launch server", &e);
    }

    if let Err(e) = shutdown_tracing(guard) {
        fatal("Error shutting down tracer provider", &e);
    }

    Ok(())
}
