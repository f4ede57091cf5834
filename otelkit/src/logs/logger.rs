use crate::common::InstrumentationScope;
use crate::context::Context;
use crate::logs::{SdkLogRecord, SdkLoggerProvider};
use crate::otel_debug;

/// Creates and emits log records for one instrumentation scope.
///
/// Loggers are cheap handles onto the shared provider state; they can be
/// cloned freely and used from any thread.
#[derive(Debug, Clone)]
pub struct SdkLogger {
    scope: InstrumentationScope,
    provider: SdkLoggerProvider,
}

impl SdkLogger {
    pub(crate) fn new(scope: InstrumentationScope, provider: SdkLoggerProvider) -> Self {
        SdkLogger { scope, provider }
    }

    /// The instrumentation scope this logger reports under.
    pub fn scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// Creates an empty mutable record.
    ///
    /// The provider clock is read once here; if the record is emitted without
    /// explicit timestamps, this reading becomes the observed timestamp even
    /// when emit happens much later.
    pub fn create_log_record(&self) -> SdkLogRecord {
        let inner = self.provider.inner();
        SdkLogRecord::new(inner.clock().now(), &inner.log_record_limits())
    }

    /// Emits a record into the processor chain.
    ///
    /// This is the freeze transition: the record is consumed, defaults are
    /// applied, the active span context is captured from the current
    /// [`Context`], and every registered processor observes the record
    /// exactly once. Emitting never fails from the caller's perspective.
    pub fn emit(&self, mut record: SdkLogRecord) {
        let inner = self.provider.inner();
        if inner.is_shutdown() {
            otel_debug!(name: "SdkLogger.Emit.ProviderShutdown");
            return;
        }
        let processor = inner.processor();
        if !processor.is_emit_required() {
            return;
        }

        if record.observed_timestamp.is_none() {
            record.observed_timestamp = Some(record.created_nanos);
        }
        if record.timestamp.is_none() {
            record.timestamp = record.observed_timestamp;
        }

        if record.trace_context.is_none() {
            Context::map_current(|cx| {
                if let Some(span_context) = cx.span_context() {
                    if span_context.is_valid() {
                        record.set_span_context(span_context);
                    }
                }
            });
        }

        processor.emit(&mut record, &self.scope);
    }
}
