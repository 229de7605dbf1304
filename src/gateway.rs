//! API gateway: traced pass-through proxy to the backend
//!
//! Every path except `/health` runs the proxy flow: continue the caller's
//! trace in a server span, open a child span, call the backend through the
//! traced client, and relay the backend's body.

use crate::http_client::{ClientError, TracedClient};
use crate::server::http_tracing::{end_server_span, record_error, start_server_span};
use crate::server::{health_response, text_response, Handler};
use crate::telemetry::log_span_context;
use async_trait::async_trait;
use hyper::{Request, Response, StatusCode};
use opentelemetry::trace::{TraceContextExt, Tracer as _};
use opentelemetry::Context;
use opentelemetry_sdk::trace::Tracer;
use tracing::{error, info};

/// Server span wrapping the whole proxy request
pub const PROXY_SPAN_NAME: &str = "proxy request to backend";
/// Child span covering the backend call
pub const PROXY_CHILD_SPAN_NAME: &str = "proxy request";
/// Operation span around the outbound request
pub const CLIENT_SPAN_NAME: &str = "client request";

/// Gateway request handler
pub struct GatewayService {
    tracer: Tracer,
    client: TracedClient,
    backend_endpoint: String,
}

impl GatewayService {
    pub fn new(tracer: Tracer, backend_endpoint: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            client: TracedClient::new(tracer.clone())?,
            tracer,
            backend_endpoint: backend_endpoint.into(),
        })
    }

    /// Backend URL every proxied request is sent to
    pub fn backend_endpoint(&self) -> &str {
        &self.backend_endpoint
    }

    async fn proxy(&self, req: &Request<()>, cx: &Context) -> Response<String> {
        info!("Get /hello");
        info!(headers = ?req.headers(), "Request headers");
        log_span_context("Parent Span", cx.span().span_context());

        let child = self.tracer.start_with_context(PROXY_CHILD_SPAN_NAME, cx);
        let child_cx = cx.with_span(child);
        log_span_context("Child Span", child_cx.span().span_context());

        let response = match self
            .client
            .fetch(&child_cx, CLIENT_SPAN_NAME, &self.backend_endpoint)
            .await
        {
            Ok(backend) => text_response(
                StatusCode::OK,
                format!("Response from backend is {}", backend.text()),
            ),
            Err(e) => {
                error!(error = %e, backend = %self.backend_endpoint, "Backend request failed");
                record_error(&child_cx, &e.to_string());
                record_error(cx, &e.to_string());
                text_response(
                    StatusCode::BAD_GATEWAY,
                    format!("Backend request failed: {}", e),
                )
            }
        };

        child_cx.span().end();
        response
    }
}

#[async_trait]
impl Handler for GatewayService {
    async fn handle(&self, req: Request<()>) -> Response<String> {
        if req.uri().path() == "/health" {
            return health_response();
        }

        let cx = start_server_span(&self.tracer, PROXY_SPAN_NAME, &req);
        let response = self.proxy(&req, &cx).await;
        end_server_span(&cx, response.status());

        response
    }
}
