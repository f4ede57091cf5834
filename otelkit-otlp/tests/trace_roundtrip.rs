//! Round-trip tests: spans serialized by the hand-written encoder must
//! decode field for field with an independent protobuf implementation.

mod support;

use futures_executor::block_on;
use otelkit::trace::{
    InMemorySpanExporter, SdkTracerProvider, SpanContext, SpanExporter, SpanId, SpanKind, Status,
    TraceFlags, TraceId, TraceState,
};
use otelkit::{InstrumentationScope, KeyValue, Resource};
use otelkit_otlp::OtlpHttpExporterBuilder;
use prost::Message;
use support::{any_value, ExportTraceServiceRequest, MockHttpClient};

fn export_and_decode(spans: Vec<otelkit::trace::SpanData>) -> ExportTraceServiceRequest {
    let mock = MockHttpClient::new();
    let exporter = OtlpHttpExporterBuilder::default()
        .with_endpoint("http://localhost:4318")
        .with_http_client(mock.clone())
        .build_span_exporter()
        .expect("exporter builds");
    block_on(exporter.export(spans)).expect("export succeeds");
    assert_eq!(mock.request_count(), 1);
    ExportTraceServiceRequest::decode(mock.body_of(0)).expect("decodes as OTLP")
}

fn finished_spans(
    resource: Resource,
    build: impl FnOnce(&SdkTracerProvider),
) -> Vec<otelkit::trace::SpanData> {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_simple_exporter(exporter.clone())
        .build();
    build(&provider);
    exporter.get_finished_spans().expect("collects spans")
}

#[test]
fn span_fields_survive_the_round_trip() {
    let resource = Resource::builder_empty()
        .with_attributes([KeyValue::new("service.name", "roundtrip")])
        .with_schema_url("https://opentelemetry.io/schemas/1.21.0")
        .build();
    let trace_id = TraceId::from_hex("1234567890abcdef1234567890abcdef").unwrap();
    let span_id = SpanId::from_hex("1234567890abcdef").unwrap();

    let spans = finished_spans(resource, |provider| {
        let scope = InstrumentationScope::builder("roundtrip-lib")
            .with_version("0.1.0")
            .build();
        let tracer = provider.tracer_with_scope(scope);
        let mut span = tracer
            .span_builder("TestSpan")
            .with_kind(SpanKind::Server)
            .with_trace_id(trace_id)
            .with_span_id(span_id)
            .with_start_time(1_000)
            .with_attributes([
                KeyValue::new("str", "value"),
                KeyValue::new("int", 42i64),
                KeyValue::new("bool", true),
                KeyValue::new("double", 1.5f64),
                KeyValue::new("array", vec![1i64, 2, 3]),
            ])
            .start(&tracer);
        span.add_event_with_timestamp("an-event", 1_500, vec![KeyValue::new("k", "v")]);
        span.add_link(
            SpanContext::new(
                TraceId::from_hex("abcdefabcdefabcdefabcdefabcdefab").unwrap(),
                SpanId::from_hex("abcdefabcdefabcd").unwrap(),
                TraceFlags::SAMPLED,
                true,
                TraceState::from_key_value([("vendor", "x")]),
            ),
            vec![],
        );
        span.set_status(Status::error("went wrong"));
        span.end_with_timestamp(2_000);
    });

    let request = export_and_decode(spans);
    assert_eq!(request.resource_spans.len(), 1);

    let resource_spans = &request.resource_spans[0];
    assert_eq!(resource_spans.schema_url, "https://opentelemetry.io/schemas/1.21.0");
    let resource_attrs = &resource_spans.resource.as_ref().unwrap().attributes;
    assert_eq!(resource_attrs.len(), 1);
    assert_eq!(resource_attrs[0].key, "service.name");

    assert_eq!(resource_spans.scope_spans.len(), 1);
    let scope_spans = &resource_spans.scope_spans[0];
    let scope = scope_spans.scope.as_ref().unwrap();
    assert_eq!(scope.name, "roundtrip-lib");
    assert_eq!(scope.version, "0.1.0");

    assert_eq!(scope_spans.spans.len(), 1);
    let span = &scope_spans.spans[0];
    assert_eq!(span.name, "TestSpan");
    assert_eq!(span.kind, 2); // SPAN_KIND_SERVER
    assert_eq!(span.trace_id, trace_id.to_bytes());
    assert_eq!(span.span_id, span_id.to_bytes());
    assert!(span.parent_span_id.is_empty());
    assert_eq!(span.start_time_unix_nano, 1_000);
    assert_eq!(span.end_time_unix_nano, 2_000);
    assert_eq!(span.flags, 0x101);
    assert_eq!(span.dropped_attributes_count, 0);

    // attributes keep insertion order and value types
    let attrs = &span.attributes;
    assert_eq!(attrs.len(), 5);
    assert_eq!(attrs[0].key, "str");
    assert_eq!(
        attrs[0].value.as_ref().unwrap().value,
        Some(any_value::Value::StringValue("value".into()))
    );
    assert_eq!(
        attrs[1].value.as_ref().unwrap().value,
        Some(any_value::Value::IntValue(42))
    );
    assert_eq!(
        attrs[2].value.as_ref().unwrap().value,
        Some(any_value::Value::BoolValue(true))
    );
    assert_eq!(
        attrs[3].value.as_ref().unwrap().value,
        Some(any_value::Value::DoubleValue(1.5))
    );
    match &attrs[4].value.as_ref().unwrap().value {
        Some(any_value::Value::ArrayValue(array)) => {
            let ints: Vec<_> = array.values.iter().map(|v| v.value.clone()).collect();
            assert_eq!(
                ints,
                vec![
                    Some(any_value::Value::IntValue(1)),
                    Some(any_value::Value::IntValue(2)),
                    Some(any_value::Value::IntValue(3)),
                ]
            );
        }
        other => panic!("expected array value, got {other:?}"),
    }

    assert_eq!(span.events.len(), 1);
    assert_eq!(span.events[0].name, "an-event");
    assert_eq!(span.events[0].time_unix_nano, 1_500);
    assert_eq!(span.events[0].attributes.len(), 1);

    assert_eq!(span.links.len(), 1);
    let link = &span.links[0];
    assert_eq!(link.trace_state, "vendor=x");
    assert_eq!(link.flags & 0x200, 0x200); // linked context is remote
    assert_eq!(
        link.trace_id,
        TraceId::from_hex("abcdefabcdefabcdefabcdefabcdefab").unwrap().to_bytes()
    );

    let status = span.status.as_ref().unwrap();
    assert_eq!(status.code, 2); // STATUS_CODE_ERROR
    assert_eq!(status.message, "went wrong");
}

#[test]
fn parent_span_id_round_trips_for_children() {
    let spans = finished_spans(Resource::builder_empty().build(), |provider| {
        let tracer = provider.tracer("parenting");
        let parent = tracer.span_builder("parent").start(&tracer);
        {
            let _guard = parent.make_current();
            tracer.span_builder("child").start(&tracer).end();
        }
        drop(parent);
    });

    let request = export_and_decode(spans);
    let all_spans: Vec<_> = request.resource_spans[0]
        .scope_spans
        .iter()
        .flat_map(|s| s.spans.iter())
        .collect();
    let parent = all_spans.iter().find(|s| s.name == "parent").unwrap();
    let child = all_spans.iter().find(|s| s.name == "child").unwrap();
    assert_eq!(child.parent_span_id, parent.span_id);
    assert_eq!(child.trace_id, parent.trace_id);
}

#[test]
fn grouping_produces_first_seen_resource_and_scope_order() {
    // Resources {A, A, B} and scopes {S1, S2, S1} in emission order.
    let resource_a = Resource::builder_empty()
        .with_attributes([KeyValue::new("res", "a")])
        .build();
    let resource_b = Resource::builder_empty()
        .with_attributes([KeyValue::new("res", "b")])
        .build();

    let mut spans = finished_spans(resource_a, |provider| {
        let tracer_s1 = provider.tracer("s1");
        let tracer_s2 = provider.tracer("s2");
        tracer_s1.span_builder("span-1").start(&tracer_s1).end();
        tracer_s2.span_builder("span-2").start(&tracer_s2).end();
    });
    spans.extend(finished_spans(resource_b, |provider| {
        let tracer_s1 = provider.tracer("s1");
        tracer_s1.span_builder("span-3").start(&tracer_s1).end();
    }));

    let request = export_and_decode(spans);
    assert_eq!(request.resource_spans.len(), 2);

    let first = &request.resource_spans[0];
    assert_eq!(first.resource.as_ref().unwrap().attributes[0].key, "res");
    assert_eq!(
        first.resource.as_ref().unwrap().attributes[0].value.as_ref().unwrap().value,
        Some(any_value::Value::StringValue("a".into()))
    );
    assert_eq!(first.scope_spans.len(), 2);
    assert_eq!(first.scope_spans[0].scope.as_ref().unwrap().name, "s1");
    assert_eq!(first.scope_spans[0].spans.len(), 1);
    assert_eq!(first.scope_spans[1].scope.as_ref().unwrap().name, "s2");
    assert_eq!(first.scope_spans[1].spans.len(), 1);

    let second = &request.resource_spans[1];
    assert_eq!(
        second.resource.as_ref().unwrap().attributes[0].value.as_ref().unwrap().value,
        Some(any_value::Value::StringValue("b".into()))
    );
    assert_eq!(second.scope_spans.len(), 1);
    assert_eq!(second.scope_spans[0].spans.len(), 1);
}

#[test]
fn dropped_attribute_counts_reach_the_wire() {
    let exporter = InMemorySpanExporter::default();
    let mut limits = otelkit::trace::SpanLimits::default();
    limits.max_attributes_per_span = 2;
    let provider = SdkTracerProvider::builder()
        .with_span_limits(limits)
        .with_simple_exporter(exporter.clone())
        .build();
    let tracer = provider.tracer("limits");
    let mut span = tracer.span_builder("op").start(&tracer);
    for i in 0..5 {
        span.set_attribute(KeyValue::new(format!("key{i}"), i as i64));
    }
    span.end();

    let request = export_and_decode(exporter.get_finished_spans().unwrap());
    let span = &request.resource_spans[0].scope_spans[0].spans[0];
    assert_eq!(span.attributes.len(), 2);
    assert_eq!(span.dropped_attributes_count, 3);
}
