use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::common::InstrumentationScope;
use crate::completion::CompletableResultCode;
use crate::logs::log_processor::{composite, LogProcessor};
use crate::logs::{
    BatchLogProcessor, LogExporter, LogRecordLimits, SdkLogger, SimpleLogProcessor,
};
use crate::resource::Resource;
use crate::time::{Clock, SystemClock};
use crate::{otel_debug, otel_info};

// Placeholder returned for loggers requested after shutdown.
static NOOP_LOGGER_PROVIDER: OnceLock<SdkLoggerProvider> = OnceLock::new();

fn noop_logger_provider() -> &'static SdkLoggerProvider {
    NOOP_LOGGER_PROVIDER.get_or_init(|| SdkLoggerProvider {
        inner: Arc::new(LoggerProviderInner {
            processor: composite(Vec::new()),
            resource: Resource::empty(),
            clock: Arc::new(SystemClock::new()),
            limits_supplier: Box::new(LogRecordLimits::default),
            is_shutdown: AtomicBool::new(true),
            shutdown_result: Mutex::new(Some(CompletableResultCode::of_success())),
        }),
    })
}

/// Handles the creation and coordination of [`SdkLogger`]s.
///
/// All loggers created by one provider share the same clock, [`Resource`],
/// limits supplier and processor chain. The chain is composed once at build
/// time and never changes afterwards, so it can be read from any thread
/// without locking. This handle is cheap to clone; dropping the last clone
/// shuts the provider down.
#[derive(Debug, Clone)]
pub struct SdkLoggerProvider {
    inner: Arc<LoggerProviderInner>,
}

impl SdkLoggerProvider {
    /// Create a new provider builder.
    pub fn builder() -> LoggerProviderBuilder {
        LoggerProviderBuilder::default()
    }

    /// Returns a logger for the named instrumentation scope.
    pub fn logger(&self, name: impl Into<Cow<'static, str>>) -> SdkLogger {
        self.logger_with_scope(InstrumentationScope::builder(name).build())
    }

    /// Returns a logger for an explicit instrumentation scope.
    pub fn logger_with_scope(&self, scope: InstrumentationScope) -> SdkLogger {
        if self.inner.is_shutdown() {
            otel_debug!(
                name: "LoggerProvider.NoOpLoggerReturned",
                logger_name = scope.name()
            );
            return SdkLogger::new(scope, noop_logger_provider().clone());
        }
        if scope.name().is_empty() {
            otel_info!(name: "LoggerProvider.LoggerNameEmpty");
        }
        SdkLogger::new(scope, self.clone())
    }

    /// The resource associated with this provider.
    pub fn resource(&self) -> &Resource {
        &self.inner.resource
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn has_been_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    /// Flushes all processors.
    pub fn force_flush(&self) -> CompletableResultCode {
        self.inner.processor.force_flush()
    }

    /// Shuts the provider down.
    ///
    /// The first call triggers the processor chain shutdown; every later call
    /// receives the same completion token without re-triggering anything.
    pub fn shutdown(&self) -> CompletableResultCode {
        self.inner.shutdown()
    }

    pub(crate) fn inner(&self) -> &LoggerProviderInner {
        &self.inner
    }
}

pub(crate) struct LoggerProviderInner {
    processor: Box<dyn LogProcessor>,
    resource: Resource,
    clock: Arc<dyn Clock>,
    limits_supplier: Box<dyn Fn() -> LogRecordLimits + Send + Sync>,
    is_shutdown: AtomicBool,
    shutdown_result: Mutex<Option<CompletableResultCode>>,
}

impl std::fmt::Debug for LoggerProviderInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerProviderInner")
            .field("resource", &self.resource)
            .field("is_shutdown", &self.is_shutdown)
            .finish()
    }
}

impl LoggerProviderInner {
    pub(crate) fn processor(&self) -> &dyn LogProcessor {
        self.processor.as_ref()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn log_record_limits(&self) -> LogRecordLimits {
        (self.limits_supplier)()
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Relaxed)
    }

    fn shutdown(&self) -> CompletableResultCode {
        let mut result = match self.shutdown_result.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = result.as_ref() {
            otel_debug!(name: "LoggerProvider.Shutdown.AlreadyShutdown");
            return existing.clone();
        }
        self.is_shutdown.store(true, Ordering::SeqCst);
        let token = self.processor.shutdown();
        *result = Some(token.clone());
        token
    }
}

impl Drop for LoggerProviderInner {
    fn drop(&mut self) {
        if !self.is_shutdown() {
            otel_info!(
                name: "LoggerProvider.Drop",
                message = "last reference dropped, initiating shutdown"
            );
            let _ = self.shutdown();
        }
    }
}

/// Builder for [`SdkLoggerProvider`].
#[derive(Default)]
pub struct LoggerProviderBuilder {
    processors: Vec<Box<dyn LogProcessor>>,
    resource: Option<Resource>,
    clock: Option<Arc<dyn Clock>>,
    limits_supplier: Option<Box<dyn Fn() -> LogRecordLimits + Send + Sync>>,
}

impl std::fmt::Debug for LoggerProviderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerProviderBuilder")
            .field("processors", &self.processors.len())
            .field("resource", &self.resource)
            .finish()
    }
}

impl LoggerProviderBuilder {
    /// Adds a [`SimpleLogProcessor`] over `exporter` to the pipeline.
    ///
    /// Processors are invoked in the order they are added.
    pub fn with_simple_exporter<T: LogExporter + 'static>(self, exporter: T) -> Self {
        self.with_log_processor(SimpleLogProcessor::new(exporter))
    }

    /// Adds a [`BatchLogProcessor`] over `exporter` to the pipeline.
    ///
    /// Processors are invoked in the order they are added.
    pub fn with_batch_exporter<T: LogExporter + 'static>(self, exporter: T) -> Self {
        self.with_log_processor(BatchLogProcessor::new(exporter))
    }

    /// Adds a custom [`LogProcessor`] to the pipeline.
    ///
    /// Processors are invoked in the order they are added.
    pub fn with_log_processor<T: LogProcessor + 'static>(mut self, processor: T) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// The [`Resource`] to be associated with this provider.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Replaces the clock, mainly useful in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fixed record limits for every record created from this provider.
    pub fn with_log_record_limits(self, limits: LogRecordLimits) -> Self {
        self.with_log_record_limits_supplier(move || limits)
    }

    /// A limits supplier re-consulted for every record, allowing limits to
    /// change between emissions.
    pub fn with_log_record_limits_supplier(
        mut self,
        supplier: impl Fn() -> LogRecordLimits + Send + Sync + 'static,
    ) -> Self {
        self.limits_supplier = Some(Box::new(supplier));
        self
    }

    /// Create a provider from this configuration.
    pub fn build(self) -> SdkLoggerProvider {
        let resource = self.resource.unwrap_or_default();

        let mut processors = self.processors;
        for processor in &mut processors {
            processor.set_resource(&resource);
        }

        let provider = SdkLoggerProvider {
            inner: Arc::new(LoggerProviderInner {
                processor: composite(processors),
                resource,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
                limits_supplier: self
                    .limits_supplier
                    .unwrap_or_else(|| Box::new(LogRecordLimits::default)),
                is_shutdown: AtomicBool::new(false),
                shutdown_result: Mutex::new(None),
            }),
        };
        otel_debug!(name: "LoggerProvider.Built");
        provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::log_processor::tests::CountingProcessor;
    use crate::logs::InMemoryLogExporter;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn shutdown_is_one_shot_and_returns_same_token() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let provider = SdkLoggerProvider::builder()
            .with_log_processor(CountingProcessor {
                shutdowns: Arc::clone(&shutdowns),
                emit_required: true,
                ..Default::default()
            })
            .build();

        let first = provider.shutdown();
        let second = provider.shutdown();
        assert!(first.ptr_eq(&second));
        assert!(first.is_success());
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(provider.has_been_shutdown());
    }

    #[test]
    fn logger_after_shutdown_is_noop() {
        let exporter = InMemoryLogExporter::default();
        let provider = SdkLoggerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        provider.shutdown();

        let logger = provider.logger("late");
        logger.emit(logger.create_log_record());
        assert!(exporter.get_emitted_logs().unwrap().is_empty());
    }

    #[test]
    fn emit_skips_processing_when_no_processor_requires_it() {
        let emits = Arc::new(AtomicUsize::new(0));
        let provider = SdkLoggerProvider::builder()
            .with_log_processor(CountingProcessor {
                emits: Arc::clone(&emits),
                emit_required: false,
                ..Default::default()
            })
            .build();
        let logger = provider.logger("prefilter");
        logger.emit(logger.create_log_record());
        assert_eq!(emits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dynamic_limits_supplier_is_reconsulted() {
        let max = Arc::new(AtomicUsize::new(1));
        let max_clone = Arc::clone(&max);
        let provider = SdkLoggerProvider::builder()
            .with_log_record_limits_supplier(move || {
                LogRecordLimits::builder()
                    .with_max_number_of_attributes(max_clone.load(Ordering::SeqCst))
                    .build()
            })
            .build();
        let logger = provider.logger("limits");

        let mut record = logger.create_log_record();
        record.add_attribute("a", 1);
        record.add_attribute("b", 2);
        assert_eq!(record.attributes_len(), 1);

        max.store(8, Ordering::SeqCst);
        let mut record = logger.create_log_record();
        record.add_attribute("a", 1);
        record.add_attribute("b", 2);
        assert_eq!(record.attributes_len(), 2);
    }
}
