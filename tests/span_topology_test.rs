//! Span Topology Tests
//!
//! Runs each service with the same `tracing-opentelemetry` layer the binaries
//! install and checks that log lines never turn into exported spans of their
//! own: only the spans each service opens itself may reach the exporter.

#[cfg(test)]
mod tests {
    use hyper::{Request, StatusCode};
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::export::trace::SpanData;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use opentelemetry_sdk::trace::TracerProvider;
    use serial_test::serial;
    use tracehop::backend::{BackendService, HANDLING_EVENT, OPERATION_SPAN_NAME};
    use tracehop::client::ROOT_SPAN_NAME;
    use tracehop::config::TraceFormat;
    use tracehop::gateway::{
        GatewayService, CLIENT_SPAN_NAME, PROXY_CHILD_SPAN_NAME, PROXY_SPAN_NAME,
    };
    use tracehop::server::Handler;
    use tracehop::telemetry::propagation::install_propagator;
    use tracehop::ClientRunner;
    use tracing::subscriber::DefaultGuard;
    use tracing_subscriber::layer::SubscriberExt;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Provider plus a thread-local subscriber bridging `tracing` into it
    struct Bridged {
        provider: TracerProvider,
        exporter: InMemorySpanExporter,
        _default: DefaultGuard,
    }

    impl Bridged {
        fn new() -> Self {
            let exporter = InMemorySpanExporter::default();
            let provider = TracerProvider::builder()
                .with_simple_exporter(exporter.clone())
                .build();
            let subscriber = tracing_subscriber::registry()
                .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("subscriber")));
            let _default = tracing::subscriber::set_default(subscriber);
            Self {
                provider,
                exporter,
                _default,
            }
        }

        fn spans(&self) -> Vec<SpanData> {
            self.provider.force_flush();
            self.exporter.get_finished_spans().unwrap()
        }
    }

    fn names(spans: &[SpanData]) -> Vec<String> {
        let mut names: Vec<String> = spans.iter().map(|s| s.name.to_string()).collect();
        names.sort();
        names
    }

    fn event_names(span: &SpanData) -> Vec<String> {
        span.events.iter().map(|e| e.name.to_string()).collect()
    }

    async fn mock_server(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    #[serial]
    async fn test_backend_exports_only_operation_span() {
        install_propagator(TraceFormat::Otel);
        let bridged = Bridged::new();
        let backend = BackendService::new(bridged.provider.tracer("backend-tracer"));

        let req = Request::builder()
            .uri("/hello")
            .header(
                "traceparent",
                "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
            )
            .body(())
            .unwrap();
        let response = backend.handle(req).await;
        assert_eq!(response.status(), StatusCode::OK);

        let spans = bridged.spans();
        assert_eq!(names(&spans), vec![OPERATION_SPAN_NAME]);
        assert_eq!(event_names(&spans[0]), vec![HANDLING_EVENT]);
        assert_eq!(spans[0].parent_span_id.to_string(), "b7ad6b7169203331");
    }

    #[tokio::test]
    #[serial]
    async fn test_gateway_exports_four_spans() {
        install_propagator(TraceFormat::Otel);
        let backend = mock_server("Hello, world!\n").await;
        let bridged = Bridged::new();
        let gateway = GatewayService::new(
            bridged.provider.tracer("api-gateway"),
            format!("{}/hello", backend.uri()),
        )
        .unwrap();

        let req = Request::builder().uri("/").body(()).unwrap();
        let response = gateway.handle(req).await;
        assert_eq!(response.status(), StatusCode::OK);

        let spans = bridged.spans();
        let mut expected = vec![
            PROXY_SPAN_NAME,
            PROXY_CHILD_SPAN_NAME,
            CLIENT_SPAN_NAME,
            "HTTP GET",
        ];
        expected.sort();
        assert_eq!(names(&spans), expected);

        // Log lines stay in the log output
        for span in &spans {
            assert!(
                event_names(span).is_empty(),
                "span {:?} carries events {:?}",
                span.name,
                event_names(span)
            );
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_client_send_notice_is_not_a_span_event() {
        install_propagator(TraceFormat::Otel);
        let gateway = mock_server("Response from backend is Hello, world!\n").await;
        let bridged = Bridged::new();
        let runner = ClientRunner::new(
            bridged.provider.tracer("client-tracer"),
            format!("{}/", gateway.uri()),
        )
        .unwrap();

        runner.retrieve_response().await.unwrap();

        let spans = bridged.spans();
        let mut expected = vec![ROOT_SPAN_NAME, "HTTP GET"];
        expected.sort();
        assert_eq!(names(&spans), expected);
        assert!(spans
            .iter()
            .all(|span| !event_names(span).iter().any(|e| e == "Sending request...")));
    }
}
