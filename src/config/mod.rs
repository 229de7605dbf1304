//! Configuration module for tracehop
//!
//! All three processes share one configuration shape. It is normally built
//! from environment variables ([`Config::from_env`]) and can also be loaded
//! from a YAML file with `${VAR}` / `${VAR:-default}` expansion
//! ([`Config::load`]).
//!
//! | Variable | Used by | Default |
//! |----------|---------|---------|
//! | `FORMAT` | all (required by backend and client) | `OTEL` for the gateway |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | all | `0.0.0.0:4317` |
//! | `OTEL_SERVICE_NAME` | all | per process |
//! | `BACKEND_ENDPOINT` | gateway (required) | none |
//! | `GATEWAY_ENDPOINT` | client | `http://localhost:8080/` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Environment variable selecting the trace format
pub const FORMAT_ENV: &str = "FORMAT";
/// Environment variable holding the OTLP collector endpoint
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Environment variable overriding the reported service name
pub const SERVICE_NAME_ENV: &str = "OTEL_SERVICE_NAME";
/// Environment variable holding the URL the gateway proxies to
pub const BACKEND_ENDPOINT_ENV: &str = "BACKEND_ENDPOINT";
/// Environment variable holding the URL the client calls
pub const GATEWAY_ENDPOINT_ENV: &str = "GATEWAY_ENDPOINT";

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Read an environment variable, treating an empty value as unset
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("environment variable FORMAT (XRAY or OTEL) not set")]
    FormatNotSet,

    #[error("Invalid trace format '{0}': must be XRAY or OTEL")]
    InvalidFormat(String),

    #[error("environment variable BACKEND_ENDPOINT not set")]
    BackendEndpointNotSet,

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// ============================================================================
// Trace format and process role
// ============================================================================

/// Wire format used for trace identifiers and context propagation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "UPPERCASE")]
pub enum TraceFormat {
    /// W3C Trace Context (`traceparent` / `tracestate`) with random IDs
    Otel,
    /// AWS X-Ray (`X-Amzn-Trace-Id`) with time-prefixed trace IDs
    Xray,
}

impl FromStr for TraceFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OTEL" => Ok(TraceFormat::Otel),
            "XRAY" => Ok(TraceFormat::Xray),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for TraceFormat {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TraceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceFormat::Otel => f.write_str("OTEL"),
            TraceFormat::Xray => f.write_str("XRAY"),
        }
    }
}

/// Which of the three processes is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Gateway,
    Backend,
    Client,
}

impl Role {
    /// Service name reported when none is configured
    pub fn default_service_name(&self) -> &'static str {
        match self {
            Role::Gateway => "api-gateway",
            Role::Backend => "backend-service",
            Role::Client => "client",
        }
    }

    /// Instrumentation scope name of the process tracer
    pub fn tracer_name(&self) -> &'static str {
        match self {
            Role::Gateway => "api-gateway",
            Role::Backend => "backend-tracer",
            Role::Client => "client-tracer",
        }
    }
}

// ============================================================================
// Configuration structures
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Build configuration from defaults overlaid with environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(format) = env_non_empty(FORMAT_ENV) {
            self.telemetry.format = Some(format.parse()?);
        }
        if let Some(endpoint) = env_non_empty(OTLP_ENDPOINT_ENV) {
            self.telemetry.otlp.endpoint = endpoint;
        }
        if let Some(name) = env_non_empty(SERVICE_NAME_ENV) {
            self.telemetry.service_name = Some(name);
        }
        if let Some(endpoint) = env_non_empty(BACKEND_ENDPOINT_ENV) {
            self.gateway.backend_endpoint = Some(endpoint);
        }
        if let Some(url) = env_non_empty(GATEWAY_ENDPOINT_ENV) {
            self.client.gateway_url = url;
        }
        Ok(())
    }

    /// Validate settings shared by every process
    pub fn validate(&self) -> Result<(), ConfigError> {
        let telemetry = &self.telemetry;

        if telemetry.enabled {
            let endpoint = telemetry.otlp.normalized_endpoint();
            if !is_valid_http_url(&endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid OTLP endpoint '{}': must start with http:// or https://",
                    telemetry.otlp.endpoint
                )));
            }

            if telemetry.otlp.timeout_seconds == 0 {
                return Err(ConfigError::ValidationError(
                    "OTLP timeout must be greater than zero".into(),
                ));
            }
        }

        if let Some(ref name) = telemetry.service_name {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "Service name cannot be empty".into(),
                ));
            }
        }

        let batch = &telemetry.batch;
        if batch.max_queue_size == 0 || batch.max_export_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "Batch queue and export sizes must be greater than zero".into(),
            ));
        }
        if batch.max_export_batch_size > batch.max_queue_size {
            return Err(ConfigError::ValidationError(format!(
                "Batch export size {} exceeds queue size {}",
                batch.max_export_batch_size, batch.max_queue_size
            )));
        }

        Ok(())
    }

    /// Validate the settings a specific process needs to start
    pub fn validate_for(&self, role: Role) -> Result<(), ConfigError> {
        self.validate()?;
        self.telemetry.resolve_format(role)?;

        match role {
            Role::Gateway => {
                let endpoint = self
                    .gateway
                    .backend_endpoint
                    .as_deref()
                    .ok_or(ConfigError::BackendEndpointNotSet)?;
                if !is_valid_http_url(endpoint) {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid backend endpoint '{}': must start with http:// or https://",
                        endpoint
                    )));
                }
                parse_address(&self.gateway.address)?;
            }
            Role::Backend => {
                parse_address(&self.backend.address)?;
            }
            Role::Client => {
                if !is_valid_http_url(&self.client.gateway_url) {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid gateway URL '{}': must start with http:// or https://",
                        self.client.gateway_url
                    )));
                }
            }
        }

        Ok(())
    }
}

fn parse_address(address: &str) -> Result<SocketAddr, ConfigError> {
    address
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("Invalid address '{}': {}", address, e)))
}

/// Replace the port of a `host:port` listen address
pub fn with_port(address: &str, port: u16) -> String {
    match address.rsplit_once(':') {
        Some((host, _)) => format!("{}:{}", host, port),
        None => format!("{}:{}", address, port),
    }
}

// ============================================================================
// Telemetry Configuration
// ============================================================================

/// OpenTelemetry tracing configuration.
///
/// # Example
///
/// ```yaml
/// telemetry:
///   enabled: true
///   format: "XRAY"
///   service_name: "${SERVICE:-backend-service}"
///   otlp:
///     endpoint: "http://collector:4317"
///   batch:
///     scheduled_delay_millis: 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Export spans over OTLP. Default: true
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    /// Service name override. Each process has its own default.
    #[serde(default)]
    pub service_name: Option<String>,

    /// Trace format. Required by the backend and the client.
    #[serde(default)]
    pub format: Option<TraceFormat>,

    /// OTLP exporter configuration
    #[serde(default)]
    pub otlp: OtlpConfig,

    /// Batch span processor configuration
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            service_name: None,
            format: None,
            otlp: OtlpConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Trace format for the given process.
    ///
    /// The gateway falls back to W3C Trace Context; the backend and the
    /// client refuse to start without an explicit format.
    pub fn resolve_format(&self, role: Role) -> Result<TraceFormat, ConfigError> {
        match (self.format, role) {
            (Some(format), _) => Ok(format),
            (None, Role::Gateway) => Ok(TraceFormat::Otel),
            (None, _) => Err(ConfigError::FormatNotSet),
        }
    }

    /// Service name for the given process
    pub fn service_name_for(&self, role: Role) -> String {
        self.service_name
            .clone()
            .unwrap_or_else(|| role.default_service_name().to_string())
    }
}

fn default_telemetry_enabled() -> bool {
    true
}

/// OTLP gRPC exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtlpConfig {
    /// Collector endpoint. A bare `host:port` is treated as `http://host:port`.
    #[serde(default = "default_otlp_endpoint")]
    pub endpoint: String,

    /// Timeout for OTLP export in seconds. Default: 10
    #[serde(default = "default_otlp_timeout")]
    pub timeout_seconds: u64,
}

impl Default for OtlpConfig {
    fn default() -> Self {
        Self {
            endpoint: default_otlp_endpoint(),
            timeout_seconds: default_otlp_timeout(),
        }
    }
}

impl OtlpConfig {
    /// Endpoint with an `http://` scheme added when none is present
    pub fn normalized_endpoint(&self) -> String {
        let endpoint = self.endpoint.trim();
        if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        }
    }
}

fn default_otlp_endpoint() -> String {
    "0.0.0.0:4317".to_string()
}

fn default_otlp_timeout() -> u64 {
    10
}

/// Batch span processor configuration.
///
/// ```yaml
/// batch:
///   max_queue_size: 2048
///   scheduled_delay_millis: 5000
///   max_export_batch_size: 512
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of spans to queue before dropping. Default: 2048
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Delay in milliseconds between scheduled exports. Default: 5000
    #[serde(default = "default_scheduled_delay")]
    pub scheduled_delay_millis: u64,

    /// Maximum number of spans per export batch. Default: 512
    #[serde(default = "default_max_export_batch_size")]
    pub max_export_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            scheduled_delay_millis: default_scheduled_delay(),
            max_export_batch_size: default_max_export_batch_size(),
        }
    }
}

fn default_max_queue_size() -> usize {
    2048
}

fn default_scheduled_delay() -> u64 {
    5000
}

fn default_max_export_batch_size() -> usize {
    512
}

// ============================================================================
// Process Configuration
// ============================================================================

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_address")]
    pub address: String,
    /// Full URL of the backend endpoint, e.g. `http://backend:3000/hello`
    #[serde(default)]
    pub backend_endpoint: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: default_gateway_address(),
            backend_endpoint: None,
        }
    }
}

fn default_gateway_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_address")]
    pub address: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: default_backend_address(),
        }
    }
}

fn default_backend_address() -> String {
    "0.0.0.0:3000".to_string()
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// Seconds to wait after the request so the batch processor can export
    #[serde(default = "default_export_wait")]
    pub export_wait_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            export_wait_seconds: default_export_wait(),
        }
    }
}

fn default_gateway_url() -> String {
    "http://localhost:8080/".to_string()
}

fn default_export_wait() -> u64 {
    10
}
