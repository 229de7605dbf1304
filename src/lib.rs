//! Tracehop Library
//!
//! Distributed trace propagation across three processes: a client starts a
//! trace, an API gateway proxies it, and a backend ends it.
//!
//! # Features
//!
//! - **Two Formats**: W3C Trace Context (`OTEL`) or AWS X-Ray (`XRAY`)
//! - **OTLP Export**: Spans batched to an OTLP/gRPC collector
//! - **JSON Logs**: Structured logs on stdout, bridged into the trace
//!
//! # Example
//!
//! ```no_run
//! use tracehop::config::{Config, Role};
//! use tracehop::server::HttpServer;
//! use tracehop::telemetry::init_subscriber;
//! use tracehop::BackendService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate_for(Role::Backend)?;
//!     let guard = init_subscriber(&config.telemetry, Role::Backend, "info")?;
//!
//!     let server = HttpServer::bind(&config.backend.address, BackendService::new(guard.tracer())).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod gateway;
pub mod http_client;
pub mod server;
pub mod telemetry;

// Re-export commonly used types
pub use backend::BackendService;
pub use client::ClientRunner;
pub use config::Config;
pub use gateway::GatewayService;
pub use server::HttpServer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
