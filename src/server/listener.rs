//! Connection accept loop
//!
//! Built on `hyper` and `tokio`: HTTP/1.1 only, one task per connection.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use hyper::{Request, Response, StatusCode};
//! use tracehop::server::{text_response, Handler, HttpServer};
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Handler for Ping {
//!     async fn handle(&self, _req: Request<()>) -> Response<String> {
//!         text_response(StatusCode::OK, "pong")
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = HttpServer::bind("127.0.0.1:0", Ping).await?;
//! println!("Server bound to: {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::server::{shutdown_signal, Handler, ServerError};
use crate::telemetry::instrumentation::PeerAddr;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// HTTP server bound to a local address
pub struct HttpServer<H> {
    handler: Arc<H>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl<H: Handler> HttpServer<H> {
    /// Bind to `address` immediately
    ///
    /// If port 0 is given, the OS assigns a free port; see [`local_addr`](Self::local_addr).
    ///
    /// # Returns
    ///
    /// * `Ok(HttpServer)` - Successfully bound server
    /// * `Err(ServerError::BindError)` - Failed to parse address or bind to port
    pub async fn bind(address: &str, handler: H) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        // Actual bound address, important for port 0
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            handler: Arc::new(handler),
            listener,
            local_addr,
        })
    }

    /// The socket address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves
    ///
    /// Connection errors are logged and do not stop the accept loop.
    /// Connections already in flight keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Listening on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutting down server");
                    return Ok(());
                }
            };

            let handler = Arc::clone(&self.handler);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req: Request<Incoming>| {
                    let handler = Arc::clone(&handler);
                    async move {
                        let (mut parts, _body) = req.into_parts();
                        parts.extensions.insert(PeerAddr(peer_addr));
                        let response = handler.handle(Request::from_parts(parts, ())).await;
                        Ok::<_, Infallible>(response)
                    }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::text_response;
    use async_trait::async_trait;
    use hyper::{Response, StatusCode};

    struct EchoPeer;

    #[async_trait]
    impl Handler for EchoPeer {
        async fn handle(&self, req: Request<()>) -> Response<String> {
            let peer = req
                .extensions()
                .get::<PeerAddr>()
                .map(|p| p.0.ip().to_string())
                .unwrap_or_default();
            text_response(StatusCode::OK, format!("{} {}", req.uri().path(), peer))
        }
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        let result = HttpServer::bind("not-an-address", EchoPeer).await;
        assert!(matches!(result, Err(ServerError::BindError(_))));
    }

    #[tokio::test]
    async fn test_serves_requests_until_shutdown() {
        let server = HttpServer::bind("127.0.0.1:0", EchoPeer).await.unwrap();
        let addr = server.local_addr();
        assert_ne!(addr.port(), 0);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        let body = reqwest::get(format!("http://{}/probe", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "/probe 127.0.0.1");

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
