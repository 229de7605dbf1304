//! Trace context propagation over HTTP headers
//!
//! Wraps [`hyper::HeaderMap`] as an OpenTelemetry carrier so that the global
//! propagator can read incoming context and write outgoing context. Which
//! headers are used depends on the installed [`TraceFormat`]:
//!
//! - **OTEL**: `traceparent` (`00-{trace-id}-{span-id}-{flags}`) and `tracestate`
//! - **XRAY**: `X-Amzn-Trace-Id` (`Root=1-{epoch}-{unique};Parent={span-id};Sampled={0|1}`)
//!
//! # Example
//!
//! ```
//! use hyper::HeaderMap;
//! use opentelemetry::trace::TraceContextExt;
//! use tracehop::config::TraceFormat;
//! use tracehop::telemetry::propagation::{extract_context, install_propagator};
//!
//! install_propagator(TraceFormat::Otel);
//!
//! let mut headers = HeaderMap::new();
//! headers.insert(
//!     "traceparent",
//!     "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01".parse().unwrap(),
//! );
//!
//! let cx = extract_context(&headers);
//! let span = cx.span();
//! let parent = span.span_context();
//! assert_eq!(parent.trace_id().to_string(), "0af7651916cd43dd8448eb211c80319c");
//! assert!(parent.is_remote());
//! ```

use crate::config::TraceFormat;
use crate::telemetry::xray::XrayPropagator;
use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;
use opentelemetry::global;
use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;

/// Read-only carrier over request headers
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        // HeaderMap lookups are case-insensitive
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Writable carrier over outgoing request headers
pub struct HeaderInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let name = HeaderName::from_bytes(key.as_bytes());
        let value = HeaderValue::from_str(&value);
        if let (Ok(name), Ok(value)) = (name, value) {
            self.0.insert(name, value);
        }
    }
}

/// Install the global propagator for the given trace format
pub fn install_propagator(format: TraceFormat) {
    match format {
        TraceFormat::Otel => global::set_text_map_propagator(TraceContextPropagator::new()),
        TraceFormat::Xray => global::set_text_map_propagator(XrayPropagator::new()),
    }
}

/// Extract the remote parent context from incoming headers
///
/// Returns an empty context when the headers carry no valid trace context.
pub fn extract_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Inject the span context held by `cx` into outgoing headers
pub fn inject_context(cx: &Context, headers: &mut HeaderMap) {
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(cx, &mut HeaderInjector(headers))
    });
}
