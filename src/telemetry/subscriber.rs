//! Tracing subscriber setup with layered architecture
//!
//! Every process logs JSON lines to stdout and bridges `tracing` spans into
//! the OpenTelemetry tracer. Request handlers open their spans through the
//! OpenTelemetry API and log outside any `tracing` span, so log lines never
//! become spans or span events of their own.
//!
//! # Layer Architecture
//!
//! ```text
//! Registry
//!   ├── OpenTelemetry Layer (tracer from the process guard)
//!   ├── EnvFilter (RUST_LOG, falling back to the configured level)
//!   └── Fmt Layer (JSON to stdout)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tracehop::config::{Role, TelemetryConfig, TraceFormat};
//! use tracehop::telemetry::init_subscriber;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TelemetryConfig {
//!     format: Some(TraceFormat::Otel),
//!     ..Default::default()
//! };
//!
//! let _guard = init_subscriber(&config, Role::Client, "info")?;
//! # Ok(())
//! # }
//! ```

use crate::config::{Role, TelemetryConfig};
use crate::telemetry::init::{init_tracing, TracingError, TracingGuard};
use std::fmt::Display;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Initialize tracing and install the global subscriber
///
/// # Arguments
///
/// * `config` - Telemetry configuration
/// * `role` - Which process is starting; selects tracer and service names
/// * `default_level` - Filter directive used when `RUST_LOG` is unset
///
/// # Returns
///
/// * `Ok(TracingGuard)` - Guard that manages tracing lifecycle
/// * `Err(TracingError)` - If the provider or the subscriber cannot be installed
pub fn init_subscriber(
    config: &TelemetryConfig,
    role: Role,
    default_level: &str,
) -> Result<TracingGuard, TracingError> {
    let guard = init_tracing(config, role)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(guard.tracer());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_thread_ids(true);

    let subscriber = tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        TracingError::ProviderError(format!(
            "Failed to set global subscriber (may already be initialized): {}",
            e
        ))
    })?;

    Ok(guard)
}

/// Log a fatal startup or shutdown error and exit with status 1
///
/// Installs a plain JSON subscriber first when none has been set, so errors
/// raised before [`init_subscriber`] still reach stdout in the same shape.
pub fn fatal(message: &str, err: &dyn Display) -> ! {
    if !tracing::dispatcher::has_been_set() {
        let _ = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_target(true)
            .try_init();
    }

    error!(fatal = true, "{}: {}", message, err);
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraceFormat;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_second_subscriber_init_fails() {
        let config = TelemetryConfig {
            enabled: false,
            format: Some(TraceFormat::Otel),
            ..Default::default()
        };

        // The first call may lose the race against another test binary's
        // subscriber, but a second call in the same process never succeeds.
        let _ = init_subscriber(&config, Role::Gateway, "info");
        let err = init_subscriber(&config, Role::Gateway, "info").unwrap_err();
        assert!(matches!(err, TracingError::ProviderError(_)));
    }
}
