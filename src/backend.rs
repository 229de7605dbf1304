//! Backend service: the end of the trace
//!
//! `/hello` continues the trace carried by the caller's headers in a single
//! operation span and answers with static text.

use crate::server::{health_response, text_response, Handler};
use crate::telemetry::log_span_context;
use crate::telemetry::propagation::extract_context;
use async_trait::async_trait;
use hyper::{Request, Response, StatusCode};
use opentelemetry::trace::{TraceContextExt, Tracer as _};
use opentelemetry_sdk::trace::Tracer;
use tracing::info;

/// Span started for each `/hello` request
pub const OPERATION_SPAN_NAME: &str = "some operation";
/// Event recorded on the operation span
pub const HANDLING_EVENT: &str = "handling backend";
/// Body of a successful `/hello`
pub const HELLO_BODY: &str = "Hello, world!\n";

/// Backend request handler
pub struct BackendService {
    tracer: Tracer,
}

impl BackendService {
    pub fn new(tracer: Tracer) -> Self {
        Self { tracer }
    }

    /// Handle `GET /hello`
    pub fn hello(&self, req: &Request<()>) -> Response<String> {
        info!("Get /hello");
        info!(headers = ?req.headers(), "Request headers");

        let parent_cx = extract_context(req.headers());
        log_span_context("Parent Span", parent_cx.span().span_context());

        let span = self.tracer.start_with_context(OPERATION_SPAN_NAME, &parent_cx);
        let cx = parent_cx.with_span(span);

        log_span_context("Child Span", cx.span().span_context());
        cx.span().add_event(HANDLING_EVENT, vec![]);

        cx.span().end();
        text_response(StatusCode::OK, HELLO_BODY)
    }
}

#[async_trait]
impl Handler for BackendService {
    async fn handle(&self, req: Request<()>) -> Response<String> {
        match req.uri().path() {
            "/health" => health_response(),
            "/hello" => self.hello(&req),
            _ => text_response(StatusCode::NOT_FOUND, "404 page not found\n"),
        }
    }
}
