//! OpenTelemetry distributed tracing module
//!
//! Shared by the gateway, the backend and the client. Each process installs a
//! tracer provider that exports over OTLP/gRPC, a global propagator matching
//! the configured [`TraceFormat`](crate::config::TraceFormat), and a layered
//! `tracing` subscriber that writes JSON logs to stdout.
//!
//! # Formats
//!
//! - `OTEL` - W3C Trace Context headers, random trace IDs
//! - `XRAY` - `X-Amzn-Trace-Id` header, X-Ray trace IDs (epoch-seconds prefix)
//!
//! # Example
//!
//! ```no_run
//! use tracehop::config::{Config, Role};
//! use tracehop::telemetry::init_subscriber;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let guard = init_subscriber(&config.telemetry, Role::Backend, "info")?;
//! let tracer = guard.tracer();
//! // Guard will flush spans on drop
//! # Ok(())
//! # }
//! ```

pub mod init;
pub mod instrumentation;
pub mod propagation;
pub mod subscriber;
pub mod xray;

pub use init::{init_tracing, shutdown_tracing, TracingError, TracingGuard};
pub use instrumentation::log_span_context;
pub use subscriber::{fatal, init_subscriber};
