//! HTTP server module
//!
//! A small hyper-based server shared by the gateway and the backend. Each
//! service implements [`Handler`]; the server takes care of accepting
//! connections, attaching the peer address, and shutting down on signal.

pub mod http_tracing;
pub mod listener;

pub use listener::HttpServer;

use async_trait::async_trait;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),
}

/// Request handler served by [`HttpServer`]
///
/// Requests arrive with their body already discarded; none of the routes
/// read one. The peer address is available as a
/// [`PeerAddr`](crate::telemetry::instrumentation::PeerAddr) extension.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, req: Request<()>) -> Response<String>;
}

/// Build a `text/plain` response
pub fn text_response(status: StatusCode, body: impl Into<String>) -> Response<String> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// `GET /health` response shared by both servers
pub fn health_response() -> Response<String> {
    text_response(StatusCode::OK, "Healthy\n")
}

/// Resolve when the process receives Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response() {
        let response = text_response(StatusCode::BAD_GATEWAY, "oops");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.body(), "oops");
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_health_response() {
        let response = health_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "Healthy\n");
    }

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::BindError("address in use".to_string());
        assert_eq!(err.to_string(), "Failed to bind to address: address in use");
    }
}
