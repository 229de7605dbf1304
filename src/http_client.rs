//! Traced outbound HTTP client
//!
//! Wraps `reqwest` so that every request gets its own client span and carries
//! the span's context in the propagation headers of the active format.

use crate::server::http_tracing::record_error;
use crate::telemetry::propagation::inject_context;
use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::Tracer;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Outbound request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Response of a traced request
#[derive(Debug, Clone)]
pub struct TracedResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl TracedResponse {
    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client that records a client span per request
#[derive(Clone)]
pub struct TracedClient {
    http: reqwest::Client,
    tracer: Tracer,
}

impl TracedClient {
    pub fn new(tracer: Tracer) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self { http, tracer })
    }

    /// `GET url` under a client span `HTTP GET` parented on `parent`
    ///
    /// Any HTTP status counts as a response; only transport and body errors
    /// are returned as [`ClientError`]. 5xx statuses mark the span as failed.
    pub async fn get(&self, parent: &Context, url: &str) -> Result<TracedResponse, ClientError> {
        let span = self
            .tracer
            .span_builder("HTTP GET")
            .with_kind(SpanKind::Client)
            .with_attributes(vec![
                KeyValue::new("http.method", "GET"),
                KeyValue::new("http.url", url.to_string()),
            ])
            .start_with_context(&self.tracer, parent);
        let cx = parent.with_span(span);

        let mut headers = HeaderMap::new();
        inject_context(&cx, &mut headers);

        let result = self.send(url, headers).await;

        match &result {
            Ok(response) => {
                let span = cx.span();
                span.set_attribute(KeyValue::new(
                    "http.status_code",
                    response.status.as_u16() as i64,
                ));
                if response.status.is_server_error() {
                    span.set_status(Status::error(format!("HTTP {}", response.status.as_u16())));
                }
            }
            Err(e) => record_error(&cx, &e.to_string()),
        }
        cx.span().end();

        result
    }

    async fn send(&self, url: &str, headers: HeaderMap) -> Result<TracedResponse, ClientError> {
        let response = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| ClientError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| ClientError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(TracedResponse { status, body })
    }

    /// Run `GET url` inside an operation span called `name`
    ///
    /// Logs the trace ID and a send notice before issuing the request.
    pub async fn fetch(
        &self,
        parent: &Context,
        name: &'static str,
        url: &str,
    ) -> Result<TracedResponse, ClientError> {
        let span = self.tracer.start_with_context(name, parent);
        let cx = parent.with_span(span);

        {
            let span = cx.span();
            let span_context = span.span_context();
            info!(trace_id = %span_context.trace_id(), "TraceID: {}", span_context.trace_id());
            info!("Sending request...");
        }

        let result = self.get(&cx, url).await;
        if let Err(ref e) = result {
            error!(error = %e, "Request failed");
            record_error(&cx, &e.to_string());
        }
        cx.span().end();

        result
    }
}
