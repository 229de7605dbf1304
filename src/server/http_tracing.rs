//! HTTP Request Tracing
//!
//! Server-side span lifecycle: continue the caller's trace from request
//! headers, tag the span with HTTP semantic conventions, and close it with
//! the response status.

use crate::telemetry::instrumentation::HttpSpanAttributes;
use crate::telemetry::propagation::extract_context;
use hyper::{Request, StatusCode};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::Tracer;

/// Start a server span named `name` for an incoming request
///
/// The span's parent is whatever the global propagator extracts from the
/// request headers; with no usable header the span starts a new trace. The
/// returned context holds the new span.
pub fn start_server_span(tracer: &Tracer, name: &'static str, req: &Request<()>) -> Context {
    let parent_cx = extract_context(req.headers());
    let attributes = HttpSpanAttributes::from_request(req);

    let span = tracer
        .span_builder(name)
        .with_kind(SpanKind::Server)
        .with_attributes(attributes.to_key_values())
        .start_with_context(tracer, &parent_cx);

    parent_cx.with_span(span)
}

/// Record the response status on the span held by `cx` and end it
///
/// 5xx responses mark the span as failed.
pub fn end_server_span(cx: &Context, status: StatusCode) {
    let span = cx.span();
    span.set_attribute(KeyValue::new("http.status_code", status.as_u16() as i64));
    if status.is_server_error() {
        span.set_status(Status::error(format!("HTTP {}", status.as_u16())));
    }
    span.end();
}

/// Record an error on the span held by `cx`
pub fn record_error(cx: &Context, message: &str) {
    let span = cx.span();
    span.add_event(
        "exception",
        vec![KeyValue::new("exception.message", message.to_string())],
    );
    span.set_status(Status::error(message.to_string()));
}
