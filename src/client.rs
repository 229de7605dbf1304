//! Client: starts a trace and sends it through the gateway

use crate::http_client::{ClientError, TracedClient};
use opentelemetry::Context;
use opentelemetry_sdk::trace::Tracer;

/// Root span of every client run
pub const ROOT_SPAN_NAME: &str = "client request";

/// One-shot request against the gateway
pub struct ClientRunner {
    client: TracedClient,
    url: String,
}

impl ClientRunner {
    pub fn new(tracer: Tracer, url: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            client: TracedClient::new(tracer)?,
            url: url.into(),
        })
    }

    /// Issue `GET <url>` under a new root span and return the body text
    pub async fn retrieve_response(&self) -> Result<String, ClientError> {
        let response = self
            .client
            .fetch(&Context::new(), ROOT_SPAN_NAME, &self.url)
            .await?;
        Ok(response.text())
    }
}
