//! OpenTelemetry tracer initialization and lifecycle management
//!
//! This module handles the initialization of the OpenTelemetry tracer provider,
//! OTLP exporter configuration, and graceful shutdown with span flushing.

use crate::config::{Role, TelemetryConfig, TraceFormat};
use crate::telemetry::propagation::install_propagator;
use crate::telemetry::xray::XrayIdGenerator;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporterBuilder, WithExportConfig};
use opentelemetry_sdk::trace::{
    self as sdktrace, BatchSpanProcessor, RandomIdGenerator, Sampler, Tracer, TracerProvider,
};
use opentelemetry_sdk::{runtime, Resource};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during tracing initialization
#[derive(Error, Debug)]
pub enum TracingError {
    #[error("Invalid OTLP endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to initialize OTLP exporter: {0}")]
    ExporterError(String),

    #[error("Failed to initialize tracer provider: {0}")]
    ProviderError(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// RAII guard for tracing lifecycle management
///
/// Owns the process tracer provider. When exporting is active, dropping the
/// guard flushes pending spans and shuts the global provider down.
#[derive(Debug)]
pub struct TracingGuard {
    provider: TracerProvider,
    role: Role,
    format: TraceFormat,
    active: bool,
}

impl TracingGuard {
    /// Check if spans are being exported
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Trace format selected for this process
    pub fn format(&self) -> TraceFormat {
        self.format
    }

    /// Tracer named after the process role
    pub fn tracer(&self) -> Tracer {
        self.provider.tracer(self.role.tracer_name())
    }
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if self.active {
            for result in self.provider.force_flush() {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to flush spans on shutdown");
                }
            }
            global::shutdown_tracer_provider();
        }
    }
}

/// Initialize OpenTelemetry tracing for one of the three processes
///
/// Resolves the trace format, installs the matching global propagator, and
/// builds a tracer provider with an always-on sampler. When exporting is
/// enabled, spans are batched to the OTLP gRPC endpoint. Must be called from
/// within a Tokio runtime.
///
/// # Returns
///
/// * `Ok(TracingGuard)` - Guard that manages tracing lifecycle
/// * `Err(TracingError)` - If the format is missing or the exporter cannot be built
pub fn init_tracing(config: &TelemetryConfig, role: Role) -> Result<TracingGuard, TracingError> {
    let format = config.resolve_format(role)?;

    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        config.service_name_for(role),
    )]);
    let trace_config = sdktrace::config()
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource);
    let trace_config = match format {
        TraceFormat::Otel => trace_config.with_id_generator(RandomIdGenerator::default()),
        TraceFormat::Xray => trace_config.with_id_generator(XrayIdGenerator::default()),
    };

    let mut builder = TracerProvider::builder().with_config(trace_config);
    if config.enabled {
        builder = builder.with_span_processor(build_batch_processor(config)?);
    }
    let provider = builder.build();

    global::set_tracer_provider(provider.clone());
    install_propagator(format);

    Ok(TracingGuard {
        provider,
        role,
        format,
        active: config.enabled,
    })
}

fn build_batch_processor(
    config: &TelemetryConfig,
) -> Result<BatchSpanProcessor<runtime::Tokio>, TracingError> {
    let endpoint = config.otlp.normalized_endpoint();
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(TracingError::InvalidEndpoint(format!(
            "Endpoint must start with http:// or https://, got: {}",
            config.otlp.endpoint
        )));
    }

    let exporter = SpanExporterBuilder::from(
        opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .with_timeout(Duration::from_secs(config.otlp.timeout_seconds)),
    )
    .build_span_exporter()
    .map_err(|e| TracingError::ExporterError(e.to_string()))?;

    let batch = &config.batch;
    Ok(BatchSpanProcessor::builder(exporter, runtime::Tokio)
        .with_max_queue_size(batch.max_queue_size)
        .with_scheduled_delay(Duration::from_millis(batch.scheduled_delay_millis))
        .with_max_export_batch_size(batch.max_export_batch_size)
        .build())
}

/// Explicitly shutdown tracing and flush all pending spans
///
/// This is called automatically when `TracingGuard` is dropped, but can be
/// called explicitly to observe flush failures.
pub fn shutdown_tracing(mut guard: TracingGuard) -> Result<(), TracingError> {
    if guard.active {
        // Mark as inactive to prevent double shutdown in Drop
        guard.active = false;
        let flushed: Result<Vec<()>, _> = guard.provider.force_flush().into_iter().collect();
        global::shutdown_tracer_provider();
        flushed.map_err(|e| TracingError::ProviderError(e.to_string()))?;
    }
    Ok(())
}
