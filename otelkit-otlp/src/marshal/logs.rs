//! Marshalers assembling `ExportLogsServiceRequest` from log record
//! snapshots.

use otelkit::logs::LogRecordData;
use otelkit::{InstrumentationScope, Resource};

use super::common::{
    group_by_resource_and_scope, size_repeated_key_values, write_repeated_key_values, AnyValueRef,
    ResourceMarshaler, ScopeMarshaler,
};
use super::serializer::{
    enum_field_size, fixed32_field_size, fixed64_field_size, string_size, uint32_field_size,
    ProtoSerializer,
};
use super::wire::{field, ProtoField, WIRETYPE_FIXED32, WIRETYPE_FIXED64, WIRETYPE_LENGTH_DELIMITED, WIRETYPE_VARINT};
use super::{MarshalContext, Marshaler};

mod fields {
    use super::*;

    // collector.logs.v1.ExportLogsServiceRequest
    pub(super) const REQUEST_RESOURCE_LOGS: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);

    // logs.v1.ResourceLogs
    pub(super) const RESOURCE_LOGS_RESOURCE: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const RESOURCE_LOGS_SCOPE_LOGS: ProtoField = field(2, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const RESOURCE_LOGS_SCHEMA_URL: ProtoField = field(3, WIRETYPE_LENGTH_DELIMITED);

    // logs.v1.ScopeLogs
    pub(super) const SCOPE_LOGS_SCOPE: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SCOPE_LOGS_LOG_RECORDS: ProtoField = field(2, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const SCOPE_LOGS_SCHEMA_URL: ProtoField = field(3, WIRETYPE_LENGTH_DELIMITED);

    // logs.v1.LogRecord
    pub(super) const LOG_TIME: ProtoField = field(1, WIRETYPE_FIXED64);
    pub(super) const LOG_SEVERITY_NUMBER: ProtoField = field(2, WIRETYPE_VARINT);
    pub(super) const LOG_SEVERITY_TEXT: ProtoField = field(3, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const LOG_BODY: ProtoField = field(5, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const LOG_ATTRIBUTES: ProtoField = field(6, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const LOG_DROPPED_ATTRIBUTES: ProtoField = field(7, WIRETYPE_VARINT);
    pub(super) const LOG_FLAGS: ProtoField = field(8, WIRETYPE_FIXED32);
    pub(super) const LOG_TRACE_ID: ProtoField = field(9, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const LOG_SPAN_ID: ProtoField = field(10, WIRETYPE_LENGTH_DELIMITED);
    pub(super) const LOG_OBSERVED_TIME: ProtoField = field(11, WIRETYPE_FIXED64);
    pub(super) const LOG_EVENT_NAME: ProtoField = field(12, WIRETYPE_LENGTH_DELIMITED);
}

struct LogRecordMarshaler<'a>(&'a LogRecordData);

impl Marshaler for LogRecordMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        let record = self.0;
        let mut size = fixed64_field_size(&fields::LOG_TIME, record.timestamp);
        size += enum_field_size(
            &fields::LOG_SEVERITY_NUMBER,
            record.severity_number.map(|s| s.number()).unwrap_or(0),
        );
        size += string_size(
            &fields::LOG_SEVERITY_TEXT,
            record.severity_text.as_deref().unwrap_or(""),
        );
        if let Some(body) = &record.body {
            size += super::size_message(&fields::LOG_BODY, &AnyValueRef::from(body), ctx);
        }
        size += size_repeated_key_values(
            &fields::LOG_ATTRIBUTES,
            record
                .attributes
                .iter()
                .map(|(k, v)| (k.as_str(), AnyValueRef::from(v))),
            ctx,
        );
        size += uint32_field_size(
            &fields::LOG_DROPPED_ATTRIBUTES,
            record.dropped_attributes_count(),
        );
        if let Some(trace_context) = &record.trace_context {
            let flags = trace_context
                .trace_flags
                .map(|f| u32::from(f.to_u8()))
                .unwrap_or(0);
            size += fixed32_field_size(&fields::LOG_FLAGS, flags);
            size += fields::LOG_TRACE_ID.tag_size + super::wire::len_delimited_size(16);
            size += fields::LOG_SPAN_ID.tag_size + super::wire::len_delimited_size(8);
        }
        size += fixed64_field_size(&fields::LOG_OBSERVED_TIME, record.observed_timestamp);
        size += string_size(
            &fields::LOG_EVENT_NAME,
            record.event_name.as_deref().unwrap_or(""),
        );
        size
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        let record = self.0;
        serializer.serialize_fixed64(&fields::LOG_TIME, record.timestamp);
        serializer.serialize_enum(
            &fields::LOG_SEVERITY_NUMBER,
            record.severity_number.map(|s| s.number()).unwrap_or(0),
        );
        serializer.serialize_string(
            &fields::LOG_SEVERITY_TEXT,
            record.severity_text.as_deref().unwrap_or(""),
        );
        if let Some(body) = &record.body {
            super::write_message(&fields::LOG_BODY, &AnyValueRef::from(body), serializer, ctx);
        }
        write_repeated_key_values(
            &fields::LOG_ATTRIBUTES,
            record
                .attributes
                .iter()
                .map(|(k, v)| (k.as_str(), AnyValueRef::from(v))),
            serializer,
            ctx,
        );
        serializer.serialize_uint32(
            &fields::LOG_DROPPED_ATTRIBUTES,
            record.dropped_attributes_count(),
        );
        if let Some(trace_context) = &record.trace_context {
            let flags = trace_context
                .trace_flags
                .map(|f| u32::from(f.to_u8()))
                .unwrap_or(0);
            serializer.serialize_fixed32(&fields::LOG_FLAGS, flags);
            serializer.write_bytes(&fields::LOG_TRACE_ID, &trace_context.trace_id.to_bytes());
            serializer.write_bytes(&fields::LOG_SPAN_ID, &trace_context.span_id.to_bytes());
        }
        serializer.serialize_fixed64(&fields::LOG_OBSERVED_TIME, record.observed_timestamp);
        serializer.serialize_string(
            &fields::LOG_EVENT_NAME,
            record.event_name.as_deref().unwrap_or(""),
        );
    }
}

struct ScopeLogsMarshaler<'a> {
    scope: &'a InstrumentationScope,
    log_records: Vec<LogRecordMarshaler<'a>>,
}

impl Marshaler for ScopeLogsMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        super::size_message(&fields::SCOPE_LOGS_SCOPE, &ScopeMarshaler(self.scope), ctx)
            + super::size_repeated_message(&fields::SCOPE_LOGS_LOG_RECORDS, &self.log_records, ctx)
            + string_size(
                &fields::SCOPE_LOGS_SCHEMA_URL,
                self.scope.schema_url().unwrap_or(""),
            )
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        super::write_message(
            &fields::SCOPE_LOGS_SCOPE,
            &ScopeMarshaler(self.scope),
            serializer,
            ctx,
        );
        super::write_repeated_message(
            &fields::SCOPE_LOGS_LOG_RECORDS,
            &self.log_records,
            serializer,
            ctx,
        );
        serializer.serialize_string(
            &fields::SCOPE_LOGS_SCHEMA_URL,
            self.scope.schema_url().unwrap_or(""),
        );
    }
}

struct ResourceLogsMarshaler<'a> {
    resource: &'a Resource,
    scope_logs: Vec<ScopeLogsMarshaler<'a>>,
}

impl Marshaler for ResourceLogsMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        super::size_message(
            &fields::RESOURCE_LOGS_RESOURCE,
            &ResourceMarshaler(self.resource),
            ctx,
        ) + super::size_repeated_message(&fields::RESOURCE_LOGS_SCOPE_LOGS, &self.scope_logs, ctx)
            + string_size(
                &fields::RESOURCE_LOGS_SCHEMA_URL,
                self.resource.schema_url().unwrap_or(""),
            )
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        super::write_message(
            &fields::RESOURCE_LOGS_RESOURCE,
            &ResourceMarshaler(self.resource),
            serializer,
            ctx,
        );
        super::write_repeated_message(
            &fields::RESOURCE_LOGS_SCOPE_LOGS,
            &self.scope_logs,
            serializer,
            ctx,
        );
        serializer.serialize_string(
            &fields::RESOURCE_LOGS_SCHEMA_URL,
            self.resource.schema_url().unwrap_or(""),
        );
    }
}

struct LogsRequestMarshaler<'a> {
    resource_logs: Vec<ResourceLogsMarshaler<'a>>,
}

impl Marshaler for LogsRequestMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        super::size_repeated_message(&fields::REQUEST_RESOURCE_LOGS, &self.resource_logs, ctx)
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        super::write_repeated_message(
            &fields::REQUEST_RESOURCE_LOGS,
            &self.resource_logs,
            serializer,
            ctx,
        );
    }
}

/// Serializes a flat log batch into `ExportLogsServiceRequest` bytes, grouped
/// by resource and instrumentation scope.
pub(crate) fn encode_logs_request(records: &[LogRecordData]) -> Vec<u8> {
    let groups = group_by_resource_and_scope(records, |r| &r.resource, |r| &r.scope);
    let request = LogsRequestMarshaler {
        resource_logs: groups
            .into_iter()
            .map(|(resource, scopes)| ResourceLogsMarshaler {
                resource,
                scope_logs: scopes
                    .into_iter()
                    .map(|(scope, records)| ScopeLogsMarshaler {
                        scope,
                        log_records: records.into_iter().map(LogRecordMarshaler).collect(),
                    })
                    .collect(),
            })
            .collect(),
    };
    super::marshal(&request)
}
