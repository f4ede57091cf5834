use std::borrow::Cow;

use crate::attributes::AttributesMap;
use crate::common::{AnyValue, InstrumentationScope, Key};
use crate::logs::LogRecordLimits;
use crate::resource::Resource;
use crate::trace::{SpanContext, SpanId, TraceFlags, TraceId};

/// A normalized severity value, 1 (finest trace) to 24 (most severe fatal).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd)]
pub enum Severity {
    /// TRACE
    Trace = 1,
    /// TRACE2
    Trace2 = 2,
    /// TRACE3
    Trace3 = 3,
    /// TRACE4
    Trace4 = 4,
    /// DEBUG
    Debug = 5,
    /// DEBUG2
    Debug2 = 6,
    /// DEBUG3
    Debug3 = 7,
    /// DEBUG4
    Debug4 = 8,
    /// INFO
    Info = 9,
    /// INFO2
    Info2 = 10,
    /// INFO3
    Info3 = 11,
    /// INFO4
    Info4 = 12,
    /// WARN
    Warn = 13,
    /// WARN2
    Warn2 = 14,
    /// WARN3
    Warn3 = 15,
    /// WARN4
    Warn4 = 16,
    /// ERROR
    Error = 17,
    /// ERROR2
    Error2 = 18,
    /// ERROR3
    Error3 = 19,
    /// ERROR4
    Error4 = 20,
    /// FATAL
    Fatal = 21,
    /// FATAL2
    Fatal2 = 22,
    /// FATAL3
    Fatal3 = 23,
    /// FATAL4
    Fatal4 = 24,
}

impl Severity {
    /// The short name for this severity as specified by the logs data model.
    pub const fn name(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Trace2 => "TRACE2",
            Severity::Trace3 => "TRACE3",
            Severity::Trace4 => "TRACE4",
            Severity::Debug => "DEBUG",
            Severity::Debug2 => "DEBUG2",
            Severity::Debug3 => "DEBUG3",
            Severity::Debug4 => "DEBUG4",
            Severity::Info => "INFO",
            Severity::Info2 => "INFO2",
            Severity::Info3 => "INFO3",
            Severity::Info4 => "INFO4",
            Severity::Warn => "WARN",
            Severity::Warn2 => "WARN2",
            Severity::Warn3 => "WARN3",
            Severity::Warn4 => "WARN4",
            Severity::Error => "ERROR",
            Severity::Error2 => "ERROR2",
            Severity::Error3 => "ERROR3",
            Severity::Error4 => "ERROR4",
            Severity::Fatal => "FATAL",
            Severity::Fatal2 => "FATAL2",
            Severity::Fatal3 => "FATAL3",
            Severity::Fatal4 => "FATAL4",
        }
    }

    /// The wire-format enum number of this severity.
    pub const fn number(&self) -> i32 {
        *self as i32
    }
}

/// Trace correlation data for logs emitted inside an active span.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct TraceContext {
    /// Trace id
    pub trace_id: TraceId,
    /// Span id
    pub span_id: SpanId,
    /// Trace flags
    pub trace_flags: Option<TraceFlags>,
}

impl From<&SpanContext> for TraceContext {
    fn from(span_context: &SpanContext) -> Self {
        TraceContext {
            trace_id: span_context.trace_id(),
            span_id: span_context.span_id(),
            trace_flags: Some(span_context.trace_flags()),
        }
    }
}

/// A mutable log record under construction.
///
/// Records are created by [`SdkLogger::create_log_record`] and frozen by
/// [`SdkLogger::emit`], which consumes the record; there is no way to mutate
/// a record after it has been handed to the pipeline. Attributes are bounded
/// by the provider's [`LogRecordLimits`]; attempts with an empty key are
/// silently ignored.
///
/// [`SdkLogger::create_log_record`]: crate::logs::SdkLogger::create_log_record
/// [`SdkLogger::emit`]: crate::logs::SdkLogger::emit
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SdkLogRecord {
    /// Record timestamp, nanoseconds since the unix epoch.
    pub timestamp: Option<u64>,

    /// Timestamp for when the record was observed by the SDK.
    pub observed_timestamp: Option<u64>,

    /// Trace context for logs associated with spans.
    pub trace_context: Option<TraceContext>,

    /// The original severity string from the source.
    pub severity_text: Option<Cow<'static, str>>,

    /// The corresponding severity value, normalized.
    pub severity_number: Option<Severity>,

    /// The name of the event this record represents, if any.
    pub event_name: Option<Cow<'static, str>>,

    /// Record body.
    pub body: Option<AnyValue>,

    attributes: AttributesMap,

    // Clock reading captured when the record was created; used to default
    // the observed timestamp so async builder usage does not skew it.
    pub(crate) created_nanos: u64,
}

impl SdkLogRecord {
    pub(crate) fn new(created_nanos: u64, limits: &LogRecordLimits) -> Self {
        SdkLogRecord {
            timestamp: None,
            observed_timestamp: None,
            trace_context: None,
            severity_text: None,
            severity_number: None,
            event_name: None,
            body: None,
            attributes: AttributesMap::new(
                limits.max_number_of_attributes(),
                limits.max_attribute_value_length(),
            ),
            created_nanos,
        }
    }

    /// Sets the record timestamp, nanoseconds since the unix epoch.
    pub fn set_timestamp(&mut self, nanos: u64) {
        self.timestamp = Some(nanos);
    }

    /// Sets the observed timestamp, nanoseconds since the unix epoch.
    pub fn set_observed_timestamp(&mut self, nanos: u64) {
        self.observed_timestamp = Some(nanos);
    }

    /// Associates a span context for trace correlation.
    pub fn set_span_context(&mut self, span_context: &SpanContext) {
        self.trace_context = Some(span_context.into());
    }

    /// Sets severity as text.
    pub fn set_severity_text(&mut self, text: impl Into<Cow<'static, str>>) {
        self.severity_text = Some(text.into());
    }

    /// Sets the normalized severity.
    pub fn set_severity_number(&mut self, severity: Severity) {
        self.severity_number = Some(severity);
    }

    /// Names the event this record represents.
    pub fn set_event_name(&mut self, name: impl Into<Cow<'static, str>>) {
        self.event_name = Some(name.into());
    }

    /// Sets the message body of the record.
    pub fn set_body(&mut self, body: AnyValue) {
        self.body = Some(body);
    }

    /// Adds or updates a single attribute. Empty keys are ignored.
    pub fn add_attribute<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Key>,
        V: Into<AnyValue>,
    {
        let key = key.into();
        if key.as_str().is_empty() {
            return;
        }
        self.attributes.put(key, value.into());
    }

    /// Iterates attributes in insertion order.
    pub fn attributes_iter(&self) -> impl Iterator<Item = (&Key, &AnyValue)> {
        self.attributes.iter()
    }

    /// Number of stored attributes.
    pub fn attributes_len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the given key currently holds the given value.
    pub fn attributes_contains(&self, key: &Key, value: &AnyValue) -> bool {
        self.attributes.get(key) == Some(value)
    }

    /// Number of attribute set attempts that were dropped due to limits.
    pub fn dropped_attributes_count(&self) -> u32 {
        self.attributes.dropped_count()
    }

    /// Copies the current state into an immutable export snapshot.
    ///
    /// Timestamps that are still unset fall back to the clock reading
    /// captured at record creation.
    pub fn to_log_record_data(
        &self,
        scope: &InstrumentationScope,
        resource: &Resource,
    ) -> LogRecordData {
        let observed = self.observed_timestamp.unwrap_or(self.created_nanos);
        LogRecordData {
            resource: resource.clone(),
            scope: scope.clone(),
            timestamp: self.timestamp.unwrap_or(observed),
            observed_timestamp: observed,
            trace_context: self.trace_context.clone(),
            severity_text: self.severity_text.clone(),
            severity_number: self.severity_number,
            event_name: self.event_name.clone(),
            body: self.body.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

/// An immutable log record snapshot handed to exporters.
///
/// Snapshots own all of their data and keep no reference to the mutable
/// record they were captured from.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LogRecordData {
    /// The entity that produced this record.
    pub resource: Resource,
    /// The library that produced this record.
    pub scope: InstrumentationScope,
    /// Record timestamp, nanoseconds since the unix epoch.
    pub timestamp: u64,
    /// When the record was observed by the SDK.
    pub observed_timestamp: u64,
    /// Trace correlation, if the record was emitted inside a span.
    pub trace_context: Option<TraceContext>,
    /// Severity text.
    pub severity_text: Option<Cow<'static, str>>,
    /// Normalized severity.
    pub severity_number: Option<Severity>,
    /// Event name.
    pub event_name: Option<Cow<'static, str>>,
    /// Record body.
    pub body: Option<AnyValue>,
    /// Record attributes.
    pub attributes: AttributesMap,
}

impl LogRecordData {
    /// Total attribute set attempts, including dropped ones.
    pub fn total_attribute_count(&self) -> u32 {
        self.attributes.total_added()
    }

    /// Attribute attempts dropped due to limits.
    pub fn dropped_attributes_count(&self) -> u32 {
        self.attributes.dropped_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record() -> SdkLogRecord {
        SdkLogRecord::new(42, &LogRecordLimits::default())
    }

    #[test]
    fn empty_attribute_key_is_ignored() {
        let mut record = test_record();
        record.add_attribute("", AnyValue::Int(1));
        assert_eq!(record.attributes_len(), 0);
        assert_eq!(record.dropped_attributes_count(), 0);
    }

    #[test]
    fn timestamps_default_from_creation_clock() {
        let record = test_record();
        let data = record.to_log_record_data(&InstrumentationScope::default(), &Resource::empty());
        assert_eq!(data.observed_timestamp, 42);
        assert_eq!(data.timestamp, 42);
    }

    #[test]
    fn explicit_observed_timestamp_feeds_timestamp_default() {
        let mut record = test_record();
        record.set_observed_timestamp(100);
        let data = record.to_log_record_data(&InstrumentationScope::default(), &Resource::empty());
        assert_eq!(data.observed_timestamp, 100);
        assert_eq!(data.timestamp, 100);
    }

    #[test]
    fn severity_numbers_match_data_model() {
        assert_eq!(Severity::Trace.number(), 1);
        assert_eq!(Severity::Info.number(), 9);
        assert_eq!(Severity::Fatal4.number(), 24);
        assert_eq!(Severity::Warn.name(), "WARN");
    }
}
