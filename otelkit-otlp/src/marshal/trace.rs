//! Marshalers assembling `ExportTraceServiceRequest` from span snapshots.

use otelkit::trace::{Event, Link, SpanContext, SpanData, SpanKind, Status};
use otelkit::{InstrumentationScope, Resource};

use super::common::{
    group_by_resource_and_scope, size_repeated_key_values, write_repeated_key_values, AnyValueRef,
    ResourceMarshaler, ScopeMarshaler,
};
use super::serializer::{
    bytes_size, enum_field_size, fixed32_field_size, fixed64_field_size, string_size,
    uint32_field_size, ProtoSerializer,
};
use super::wire::{self, field, ProtoField, WIRETYPE_FIXED32, WIRETYPE_FIXED64, WIRETYPE_LENGTH_DELIMITED, WIRETYPE_VARINT};
use super::{MarshalContext, Marshaler};

mod fields {
    use super::*;

    // collector.trace.v1.ExportTraceServiceRequest
    pub(super) const REQUEST_RESOURCE_SPANS: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);

    // trace.v1.ResourceSpans
    pub(super) const RESOURCE_SPANS_RESOURCE: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const RESOURCE_SPANS_SCOPE_SPANS: ProtoField = field(2, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const RESOURCE_SPANS_SCHEMA_URL: ProtoField = field(3, WIRETYPE_LENGTH_DELIMITED);

    // trace.v1.ScopeSpans
    pub(super) const SCOPE_SPANS_SCOPE: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SCOPE_SPANS_SPANS: ProtoField = field(2, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SCOPE_SPANS_SCHEMA_URL: ProtoField = field(3, WIRETYPE_LENGTH_DELIMITED);

    // trace.v1.Span
    pub(super) const SPAN_TRACE_ID: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SPAN_SPAN_ID: ProtoField = field(2, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SPAN_TRACE_STATE: ProtoField = field(3, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SPAN_PARENT_SPAN_ID: ProtoField = field(4, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SPAN_NAME: ProtoField = field(5, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SPAN_KIND: ProtoField = field(6, WIRETYPE_VARINT);
    pub(super) const SPAN_START_TIME: ProtoField = field(7, WIRETYPE_FIXED64);
    pub(super) const SPAN_END_TIME: ProtoField = field(8, WIRETYPE_FIXED64);
    pub(super) const SPAN_ATTRIBUTES: ProtoField = field(9, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SPAN_DROPPED_ATTRIBUTES: ProtoField = field(10, WIRETYPE_VARINT);
    pub(super) const SPAN_EVENTS: ProtoField = field(11, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SPAN_DROPPED_EVENTS: ProtoField = field(12, WIRETYPE_VARINT);
    pub(super) const SPAN_LINKS: ProtoField = field(13, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SPAN_DROPPED_LINKS: ProtoField = field(14, WIRETYPE_VARINT);
    pub(super) const SPAN_STATUS: ProtoField = field(15, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SPAN_FLAGS: ProtoField = field(16, WIRETYPE_FIXED32);

    // trace.v1.Span.Event
    pub(super) const EVENT_TIME: ProtoField = field(1, WIRETYPE_FIXED64);
    pub(super) const EVENT_NAME: ProtoField = field(2, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const EVENT_ATTRIBUTES: ProtoField = field(3, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const EVENT_DROPPED_ATTRIBUTES: ProtoField = field(4, WIRETYPE_VARINT);

    // trace.v1.Span.Link
    pub(super) const LINK_TRACE_ID: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const LINK_SPAN_ID: ProtoField = field(2, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const LINK_TRACE_STATE: ProtoField = field(3, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const LINK_ATTRIBUTES: ProtoField = field(4, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const LINK_DROPPED_ATTRIBUTES: ProtoField = field(5, WIRETYPE_VARINT);
    pub(super) const LINK_FLAGS: ProtoField = field(6, WIRETYPE_FIXED32);

    // trace.v1.Status
    pub(super) const STATUS_MESSAGE: ProtoField = field(2, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const STATUS_CODE: ProtoField = field(3, WIRETYPE_VARINT);
}

// Span flags carry the W3C trace flags byte plus the "context has is_remote"
// and "context is_remote" masks.
const SPAN_FLAGS_CONTEXT_HAS_IS_REMOTE: u32 = 0x100;
const SPAN_FLAGS_CONTEXT_IS_REMOTE: u32 = 0x200;

fn span_flags(span_context: &SpanContext) -> u32 {
    let mut flags = u32::from(span_context.trace_flags().to_u8()) | SPAN_FLAGS_CONTEXT_HAS_IS_REMOTE;
    if span_context.is_remote() {
        flags |= SPAN_FLAGS_CONTEXT_IS_REMOTE;
    }
    flags
}

pub(crate) fn span_kind_number(kind: &SpanKind) -> i32 {
    match kind {
        SpanKind::Internal => 1,
        SpanKind::Server => 2,
        SpanKind::Client => 3,
        SpanKind::Producer => 4,
        SpanKind::Consumer => 5,
        // `SpanKind` is `#[non_exhaustive]`; no other variant exists today.
        _ => 0,
    }
}

fn status_code_number(status: &Status) -> i32 {
    match status {
        Status::Unset => 0,
        Status::Ok => 1,
        Status::Error { .. } => 2,
        // `Status` is `#[non_exhaustive]`; no other variant exists today.
        _ => 0,
    }
}

struct StatusMarshaler<'a>(&'a Status);

impl Marshaler for StatusMarshaler<'_> {
    fn size(&self, _ctx: &mut MarshalContext) -> usize {
        let message = match self.0 {
            Status::Error { description } => description.as_ref(),
            _ => "",
        };
        string_size(&fields::STATUS_MESSAGE, message)
            + enum_field_size(&fields::STATUS_CODE, status_code_number(self.0))
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, _ctx: &mut MarshalContext) {
        if let Status::Error { description } = self.0 {
            serializer.serialize_string(&fields::STATUS_MESSAGE, description);
        }
        serializer.serialize_enum(&fields::STATUS_CODE, status_code_number(self.0));
    }
}

struct EventMarshaler<'a>(&'a Event);

impl Marshaler for EventMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        fixed64_field_size(&fields::EVENT_TIME, self.0.timestamp)
            + string_size(&fields::EVENT_NAME, &self.0.name)
            + size_repeated_key_values(
                &fields::EVENT_ATTRIBUTES,
                self.0
                    .attributes
                    .iter()
                    .map(|kv| (kv.key.as_str(), AnyValueRef::from(&kv.value))),
                ctx,
            )
            + uint32_field_size(
                &fields::EVENT_DROPPED_ATTRIBUTES,
                self.0.dropped_attributes_count,
            )
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        serializer.serialize_fixed64(&fields::EVENT_TIME, self.0.timestamp);
        serializer.serialize_string(&fields::EVENT_NAME, &self.0.name);
        write_repeated_key_values(
            &fields::EVENT_ATTRIBUTES,
            self.0
                .attributes
                .iter()
                .map(|kv| (kv.key.as_str(), AnyValueRef::from(&kv.value))),
            serializer,
            ctx,
        );
        serializer.serialize_uint32(
            &fields::EVENT_DROPPED_ATTRIBUTES,
            self.0.dropped_attributes_count,
        );
    }
}

struct LinkMarshaler<'a>(&'a Link);

impl Marshaler for LinkMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        let span_context = &self.0.span_context;
        let mut size = bytes_size(&fields::LINK_TRACE_ID, &span_context.trace_id().to_bytes())
            + bytes_size(&fields::LINK_SPAN_ID, &span_context.span_id().to_bytes());
        if !span_context.trace_state().is_empty() {
            let header = span_context.trace_state().header();
            size += fields::LINK_TRACE_STATE.tag_size + wire::len_delimited_size(header.len());
            ctx.push_data(header);
        }
        size += size_repeated_key_values(
            &fields::LINK_ATTRIBUTES,
            self.0
                .attributes
                .iter()
                .map(|kv| (kv.key.as_str(), AnyValueRef::from(&kv.value))),
            ctx,
        );
        size += uint32_field_size(
            &fields::LINK_DROPPED_ATTRIBUTES,
            self.0.dropped_attributes_count,
        );
        size += fixed32_field_size(&fields::LINK_FLAGS, span_flags(span_context));
        size
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        let span_context = &self.0.span_context;
        serializer.serialize_bytes(&fields::LINK_TRACE_ID, &span_context.trace_id().to_bytes());
        serializer.serialize_bytes(&fields::LINK_SPAN_ID, &span_context.span_id().to_bytes());
        if !span_context.trace_state().is_empty() {
            let header = ctx.next_data().to_owned();
            serializer.serialize_string(&fields::LINK_TRACE_STATE, &header);
        }
        write_repeated_key_values(
            &fields::LINK_ATTRIBUTES,
            self.0
                .attributes
                .iter()
                .map(|kv| (kv.key.as_str(), AnyValueRef::from(&kv.value))),
            serializer,
            ctx,
        );
        serializer.serialize_uint32(
            &fields::LINK_DROPPED_ATTRIBUTES,
            self.0.dropped_attributes_count,
        );
        serializer.serialize_fixed32(&fields::LINK_FLAGS, span_flags(span_context));
    }
}

struct SpanMarshaler<'a>(&'a SpanData);

impl Marshaler for SpanMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        let span = self.0;
        let mut size = bytes_size(
            &fields::SPAN_TRACE_ID,
            &span.span_context.trace_id().to_bytes(),
        ) + bytes_size(&fields::SPAN_SPAN_ID, &span.span_context.span_id().to_bytes());

        if !span.span_context.trace_state().is_empty() {
            let header = span.span_context.trace_state().header();
            size += fields::SPAN_TRACE_STATE.tag_size + wire::len_delimited_size(header.len());
            ctx.push_data(header);
        }
        if span.parent_span_id != otelkit::trace::SpanId::INVALID {
            size += bytes_size(&fields::SPAN_PARENT_SPAN_ID, &span.parent_span_id.to_bytes());
        }
        size += string_size(&fields::SPAN_NAME, &span.name);
        size += enum_field_size(&fields::SPAN_KIND, span_kind_number(&span.span_kind));
        size += fixed64_field_size(&fields::SPAN_START_TIME, span.start_time);
        size += fixed64_field_size(&fields::SPAN_END_TIME, span.end_time);
        size += size_repeated_key_values(
            &fields::SPAN_ATTRIBUTES,
            span.attributes
                .iter()
                .map(|(k, v)| (k.as_str(), AnyValueRef::from(v))),
            ctx,
        );
        size += uint32_field_size(
            &fields::SPAN_DROPPED_ATTRIBUTES,
            span.dropped_attributes_count(),
        );
        for event in span.events.iter() {
            size += super::size_message(&fields::SPAN_EVENTS, &EventMarshaler(event), ctx);
        }
        size += uint32_field_size(&fields::SPAN_DROPPED_EVENTS, span.events.dropped_count);
        for link in span.links.iter() {
            size += super::size_message(&fields::SPAN_LINKS, &LinkMarshaler(link), ctx);
        }
        size += uint32_field_size(&fields::SPAN_DROPPED_LINKS, span.links.dropped_count);
        if span.status != Status::Unset {
            size += super::size_message(&fields::SPAN_STATUS, &StatusMarshaler(&span.status), ctx);
        }
        size += fixed32_field_size(&fields::SPAN_FLAGS, span_flags(&span.span_context));
        size
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        let span = self.0;
        serializer.serialize_bytes(
            &fields::SPAN_TRACE_ID,
            &span.span_context.trace_id().to_bytes(),
        );
        serializer.serialize_bytes(&fields::SPAN_SPAN_ID, &span.span_context.span_id().to_bytes());
        if !span.span_context.trace_state().is_empty() {
            let header = ctx.next_data().to_owned();
            serializer.serialize_string(&fields::SPAN_TRACE_STATE, &header);
        }
        if span.parent_span_id != otelkit::trace::SpanId::INVALID {
            serializer.serialize_bytes(
                &fields::SPAN_PARENT_SPAN_ID,
                &span.parent_span_id.to_bytes(),
            );
        }
        serializer.serialize_string(&fields::SPAN_NAME, &span.name);
        serializer.serialize_enum(&fields::SPAN_KIND, span_kind_number(&span.span_kind));
        serializer.serialize_fixed64(&fields::SPAN_START_TIME, span.start_time);
        serializer.serialize_fixed64(&fields::SPAN_END_TIME, span.end_time);
        write_repeated_key_values(
            &fields::SPAN_ATTRIBUTES,
            span.attributes
                .iter()
                .map(|(k, v)| (k.as_str(), AnyValueRef::from(v))),
            serializer,
            ctx,
        );
        serializer.serialize_uint32(
            &fields::SPAN_DROPPED_ATTRIBUTES,
            span.dropped_attributes_count(),
        );
        for event in span.events.iter() {
            super::write_message(&fields::SPAN_EVENTS, &EventMarshaler(event), serializer, ctx);
        }
        serializer.serialize_uint32(&fields::SPAN_DROPPED_EVENTS, span.events.dropped_count);
        for link in span.links.iter() {
            super::write_message(&fields::SPAN_LINKS, &LinkMarshaler(link), serializer, ctx);
        }
        serializer.serialize_uint32(&fields::SPAN_DROPPED_LINKS, span.links.dropped_count);
        if span.status != Status::Unset {
            super::write_message(
                &fields::SPAN_STATUS,
                &StatusMarshaler(&span.status),
                serializer,
                ctx,
            );
        }
        serializer.serialize_fixed32(&fields::SPAN_FLAGS, span_flags(&span.span_context));
    }
}

struct ScopeSpansMarshaler<'a> {
    scope: &'a InstrumentationScope,
    spans: Vec<SpanMarshaler<'a>>,
}

impl Marshaler for ScopeSpansMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        super::size_message(&fields::SCOPE_SPANS_SCOPE, &ScopeMarshaler(self.scope), ctx)
            + super::size_repeated_message(&fields::SCOPE_SPANS_SPANS, &self.spans, ctx)
            + string_size(
                &fields::SCOPE_SPANS_SCHEMA_URL,
                self.scope.schema_url().unwrap_or(""),
            )
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        super::write_message(
            &fields::SCOPE_SPANS_SCOPE,
            &ScopeMarshaler(self.scope),
            serializer,
            ctx,
        );
        super::write_repeated_message(&fields::SCOPE_SPANS_SPANS, &self.spans, serializer, ctx);
        serializer.serialize_string(
            &fields::SCOPE_SPANS_SCHEMA_URL,
            self.scope.schema_url().unwrap_or(""),
        );
    }
}

struct ResourceSpansMarshaler<'a> {
    resource: &'a Resource,
    scope_spans: Vec<ScopeSpansMarshaler<'a>>,
}

impl Marshaler for ResourceSpansMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        super::size_message(
            &fields::RESOURCE_SPANS_RESOURCE,
            &ResourceMarshaler(self.resource),
            ctx,
        ) + super::size_repeated_message(
            &fields::RESOURCE_SPANS_SCOPE_SPANS,
            &self.scope_spans,
            ctx,
        ) + string_size(
            &fields::RESOURCE_SPANS_SCHEMA_URL,
            self.resource.schema_url().unwrap_or(""),
        )
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        super::write_message(
            &fields::RESOURCE_SPANS_RESOURCE,
            &ResourceMarshaler(self.resource),
            serializer,
            ctx,
        );
        super::write_repeated_message(
            &fields::RESOURCE_SPANS_SCOPE_SPANS,
            &self.scope_spans,
            serializer,
            ctx,
        );
        serializer.serialize_string(
            &fields::RESOURCE_SPANS_SCHEMA_URL,
            self.resource.schema_url().unwrap_or(""),
        );
    }
}

struct TraceRequestMarshaler<'a> {
    resource_spans: Vec<ResourceSpansMarshaler<'a>>,
}

impl Marshaler for TraceRequestMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        super::size_repeated_message(&fields::REQUEST_RESOURCE_SPANS, &self.resource_spans, ctx)
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        super::write_repeated_message(
            &fields::REQUEST_RESOURCE_SPANS,
            &self.resource_spans,
            serializer,
            ctx,
        );
    }
}

/// Serializes a flat span batch into `ExportTraceServiceRequest` bytes,
/// grouped by resource and instrumentation scope.
pub(crate) fn encode_trace_request(spans: &[SpanData]) -> Vec<u8> {
    let groups = group_by_resource_and_scope(spans, |s| &s.resource, |s| &s.scope);
    let request = TraceRequestMarshaler {
        resource_spans: groups
            .into_iter()
            .map(|(resource, scopes)| ResourceSpansMarshaler {
                resource,
                scope_spans: scopes
                    .into_iter()
                    .map(|(scope, spans)| ScopeSpansMarshaler {
                        scope,
                        spans: spans.into_iter().map(SpanMarshaler).collect(),
                    })
                    .collect(),
            })
            .collect(),
    };
    super::marshal(&request)
}
