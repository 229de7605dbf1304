//! Propagation Benchmarks
//!
//! Measures header extraction and injection for both trace formats, plus
//! X-Ray header parsing and ID generation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hyper::header::HeaderValue;
use hyper::HeaderMap;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::IdGenerator;
use tracehop::telemetry::propagation::{HeaderExtractor, HeaderInjector};
use tracehop::telemetry::xray::{XrayIdGenerator, XrayPropagator, XrayTraceHeader};

const TRACEPARENT: &str = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
const XRAY_HEADER: &str =
    "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1";

fn sampled_context() -> Context {
    Context::new().with_remote_span_context(SpanContext::new(
        TraceId::from_hex("5759e988bd862e3fe1be46a994272793").unwrap(),
        SpanId::from_hex("53995c3f42cd8ad8").unwrap(),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    ))
}

/// Benchmark context extraction from request headers
fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");

    let mut w3c_headers = HeaderMap::new();
    w3c_headers.insert("traceparent", HeaderValue::from_static(TRACEPARENT));
    w3c_headers.insert("tracestate", HeaderValue::from_static("congo=t61rcWkgMzE"));
    let w3c = TraceContextPropagator::new();
    group.bench_with_input(BenchmarkId::new("format", "OTEL"), &w3c_headers, |b, h| {
        b.iter(|| black_box(w3c.extract(&HeaderExtractor(h))));
    });

    let mut xray_headers = HeaderMap::new();
    xray_headers.insert("x-amzn-trace-id", HeaderValue::from_static(XRAY_HEADER));
    let xray = XrayPropagator::new();
    group.bench_with_input(BenchmarkId::new("format", "XRAY"), &xray_headers, |b, h| {
        b.iter(|| black_box(xray.extract(&HeaderExtractor(h))));
    });

    group.finish();
}

/// Benchmark context injection into outgoing headers
fn bench_inject(c: &mut Criterion) {
    let cx = sampled_context();
    let mut group = c.benchmark_group("inject");

    let w3c = TraceContextPropagator::new();
    group.bench_function(BenchmarkId::new("format", "OTEL"), |b| {
        b.iter(|| {
            let mut headers = HeaderMap::new();
            w3c.inject_context(black_box(&cx), &mut HeaderInjector(&mut headers));
            black_box(headers);
        });
    });

    let xray = XrayPropagator::new();
    group.bench_function(BenchmarkId::new("format", "XRAY"), |b| {
        b.iter(|| {
            let mut headers = HeaderMap::new();
            xray.inject_context(black_box(&cx), &mut HeaderInjector(&mut headers));
            black_box(headers);
        });
    });

    group.finish();
}

/// Benchmark raw X-Ray header parsing
fn bench_xray_header_parse(c: &mut Criterion) {
    c.bench_function("xray_header_parse", |b| {
        b.iter(|| black_box(black_box(XRAY_HEADER).parse::<XrayTraceHeader>()));
    });
}

/// Benchmark X-Ray trace ID generation
fn bench_xray_id_generator(c: &mut Criterion) {
    let generator = XrayIdGenerator::default();
    c.bench_function("xray_new_trace_id", |b| {
        b.iter(|| black_box(generator.new_trace_id()));
    });
}

criterion_group!(
    benches,
    bench_extract,
    bench_inject,
    bench_xray_header_parse,
    bench_xray_id_generator
);
criterion_main!(benches);
