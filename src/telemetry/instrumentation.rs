//! HTTP Span Instrumentation
//!
//! Utilities for HTTP request spans following OpenTelemetry semantic
//! conventions, plus the span-context log lines every process emits.
//!
//! # Semantic Conventions
//!
//! | Attribute | Description | Example |
//! |-----------|-------------|---------|
//! | `http.method` | HTTP method | `GET` |
//! | `http.target` | Request path | `/hello` |
//! | `http.scheme` | Scheme | `http` |
//! | `http.host` | Host header | `localhost:8080` |
//! | `http.user_agent` | User-Agent header | `curl/8.0` |
//! | `http.client_ip` | Peer address | `192.168.1.100` |
//! | `http.status_code` | Response status | `200` |

use hyper::header::{HeaderName, HOST, USER_AGENT};
use hyper::Request;
use opentelemetry::trace::SpanContext;
use opentelemetry::KeyValue;
use std::net::SocketAddr;
use tracing::info;

/// Remote address of the connection a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// HTTP span attributes following OpenTelemetry semantic conventions
#[derive(Debug, Clone)]
pub struct HttpSpanAttributes {
    /// HTTP method (GET, POST, PUT, etc.)
    pub method: String,
    /// HTTP request path
    pub path: String,
    /// HTTP host header
    pub host: String,
    /// User-Agent header (optional)
    pub user_agent: Option<String>,
    /// Client IP address (optional)
    pub client_ip: Option<String>,
}

impl HttpSpanAttributes {
    /// Collect attributes from a request
    ///
    /// The client IP comes from the [`PeerAddr`] extension set by the server.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let header = |name: HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };

        Self {
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            host: header(HOST).unwrap_or_default(),
            user_agent: header(USER_AGENT),
            client_ip: req
                .extensions()
                .get::<PeerAddr>()
                .map(|peer| peer.0.ip().to_string()),
        }
    }

    /// Convert to span attributes, skipping absent optional values
    pub fn to_key_values(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new("http.method", self.method.clone()),
            KeyValue::new("http.target", self.path.clone()),
            KeyValue::new("http.scheme", "http"),
        ];
        if !self.host.is_empty() {
            attributes.push(KeyValue::new("http.host", self.host.clone()));
        }
        if let Some(ref user_agent) = self.user_agent {
            attributes.push(KeyValue::new("http.user_agent", user_agent.clone()));
        }
        if let Some(ref client_ip) = self.client_ip {
            attributes.push(KeyValue::new("http.client_ip", client_ip.clone()));
        }
        attributes
    }
}

/// Log the trace and span IDs of a span context under the given message
pub fn log_span_context(name: &str, span_context: &SpanContext) {
    info!(
        trace_id = %span_context.trace_id(),
        span_id = %span_context.span_id(),
        "{}",
        name
    );
}
