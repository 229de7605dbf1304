//! API gateway - proxies traced requests to the backend

use clap::Parser;
use std::path::PathBuf;
use tracehop::config::{with_port, Config, ConfigError, Role};
use tracehop::server::HttpServer;
use tracehop::telemetry::{fatal, init_subscriber, shutdown_tracing};
use tracehop::GatewayService;
use tracing::info;

/// API gateway - forwards every request to BACKEND_ENDPOINT under a new span
#[derive(Parser, Debug)]
#[command(name = "api-gateway")]
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
        config.gateway.address = with_port(&config.gateway.address, port);
    }
    if let Err(e) = config.validate_for(Role::Gateway) {
        fatal("Invalid configuration", &e);
    }

    let guard = init_subscriber(&config.telemetry, Role::Gateway, &args.log_level)
        .unwrap_or_else(|e| fatal("Failed to register tracer provider", &e));

    info!(
        version = tracehop::VERSION,
        format = %guard.format(),
        "Starting api-gateway"
    );

    let backend_endpoint = config
        .gateway
        .backend_endpoint
        .clone()
        .ok_or(ConfigError::BackendEndpointNotSet)?;
    let service = GatewayService::new(guard.tracer(), backend_endpoint)?;

    let server = HttpServer::bind(&config.gateway.address, service)
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
