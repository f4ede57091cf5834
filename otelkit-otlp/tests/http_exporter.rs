//! End-to-end behavior of the OTLP/HTTP exporters against a mock transport.

mod support;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_executor::block_on;
use http::StatusCode;
use otelkit::error::SdkError;
use otelkit::trace::{
    InMemorySpanExporter, SdkTracerProvider, SpanExporter, SpanId, SpanKind, TraceId,
};
use otelkit::KeyValue;
use otelkit_otlp::OtlpHttpExporterBuilder;
use prost::Message;
use support::{ExportTraceServiceRequest, FailingHttpClient, MockHttpClient};

fn test_span_data() -> Vec<otelkit::trace::SpanData> {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let tracer = provider.tracer("e2e");
    let mut span = tracer
        .span_builder("TestSpan")
        .with_kind(SpanKind::Internal)
        .with_trace_id(TraceId::from_hex("1234567890abcdef1234567890abcdef").unwrap())
        .with_span_id(SpanId::from_hex("1234567890abcdef").unwrap())
        .with_attributes([KeyValue::new("device.name", "test-device")])
        .start(&tracer);
    span.end();
    exporter.get_finished_spans().unwrap()
}

#[tokio::test]
async fn exports_one_post_request_with_protobuf_content_type() {
    let mock = MockHttpClient::new();
    let exporter = OtlpHttpExporterBuilder::default()
        .with_endpoint("https://collector.example.com")
        .with_http_client(mock.clone())
        .build_span_exporter()
        .unwrap();

    exporter.export(test_span_data()).await.unwrap();

    assert_eq!(mock.request_count(), 1);
    let requests = mock.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.method(), http::Method::POST);
    assert_eq!(
        request.uri().to_string(),
        "https://collector.example.com/v1/traces"
    );
    assert_eq!(
        request.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "application/x-protobuf"
    );

    let decoded = ExportTraceServiceRequest::decode(request.body().clone()).unwrap();
    let span = &decoded.resource_spans[0].scope_spans[0].spans[0];
    assert_eq!(span.name, "TestSpan");
    assert_eq!(span.kind, 1); // SPAN_KIND_INTERNAL
    assert_eq!(
        span.trace_id,
        TraceId::from_hex("1234567890abcdef1234567890abcdef").unwrap().to_bytes()
    );
    assert_eq!(
        span.span_id,
        SpanId::from_hex("1234567890abcdef").unwrap().to_bytes()
    );
}

#[tokio::test]
async fn non_success_status_fails_the_export() {
    let mock = MockHttpClient::with_status(StatusCode::SERVICE_UNAVAILABLE);
    let exporter = OtlpHttpExporterBuilder::default()
        .with_endpoint("http://localhost:4318")
        .with_http_client(mock)
        .build_span_exporter()
        .unwrap();

    let err = exporter.export(test_span_data()).await.unwrap_err();
    match err {
        SdkError::InternalFailure(message) => assert!(message.contains("503")),
        other => panic!("expected internal failure, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_errors_fail_without_a_response() {
    let exporter = OtlpHttpExporterBuilder::default()
        .with_endpoint("http://localhost:4318")
        .with_http_client(FailingHttpClient)
        .build_span_exporter()
        .unwrap();

    let err = exporter.export(test_span_data()).await.unwrap_err();
    match err {
        SdkError::InternalFailure(message) => {
            assert!(message.contains("without response"));
            assert!(message.contains("connection refused"));
        }
        other => panic!("expected internal failure, got {other:?}"),
    }
}

#[tokio::test]
async fn export_after_shutdown_fails_fast() {
    let mock = MockHttpClient::new();
    let exporter = OtlpHttpExporterBuilder::default()
        .with_endpoint("http://localhost:4318")
        .with_http_client(mock.clone())
        .build_span_exporter()
        .unwrap();

    exporter.shutdown().unwrap();
    let err = exporter.export(test_span_data()).await.unwrap_err();
    assert_eq!(err, SdkError::AlreadyShutdown);
    assert_eq!(mock.request_count(), 0);

    // shutdown is reported as already done the second time
    assert_eq!(exporter.shutdown().unwrap_err(), SdkError::AlreadyShutdown);
}

#[tokio::test]
async fn header_supplier_is_invoked_per_request() {
    let counter = Arc::new(AtomicUsize::new(0));
    let supplier_counter = Arc::clone(&counter);
    let mock = MockHttpClient::new();
    let exporter = OtlpHttpExporterBuilder::default()
        .with_endpoint("http://localhost:4318")
        .with_header("x-static", "fixed")
        .with_header_supplier(move || {
            let n = supplier_counter.fetch_add(1, Ordering::SeqCst);
            HashMap::from([("authorization".to_string(), format!("Bearer token-{n}"))])
        })
        .with_http_client(mock.clone())
        .build_span_exporter()
        .unwrap();

    exporter.export(test_span_data()).await.unwrap();
    exporter.export(test_span_data()).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    let headers = mock.headers_seen.lock().unwrap();
    assert_eq!(headers[0].get("x-static").unwrap(), "fixed");
    assert_eq!(headers[0].get("authorization").unwrap(), "Bearer token-0");
    assert_eq!(headers[1].get("authorization").unwrap(), "Bearer token-1");
}

#[test]
fn logs_exporter_posts_to_the_logs_path() {
    let mock = MockHttpClient::new();
    let exporter = OtlpHttpExporterBuilder::default()
        .with_endpoint("http://localhost:4318")
        .with_http_client(mock.clone())
        .build_log_exporter()
        .unwrap();

    let in_memory = otelkit::logs::InMemoryLogExporter::default();
    let provider = otelkit::logs::SdkLoggerProvider::builder()
        .with_simple_exporter(in_memory.clone())
        .build();
    let logger = provider.logger("path-check");
    logger.emit(logger.create_log_record());

    use otelkit::logs::LogExporter;
    block_on(exporter.export(in_memory.get_emitted_logs().unwrap())).unwrap();

    let requests = mock.requests.lock().unwrap();
    assert_eq!(requests[0].uri().to_string(), "http://localhost:4318/v1/logs");
}
