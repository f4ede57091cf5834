use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::common::InstrumentationScope;
use crate::completion::CompletableResultCode;
use crate::resource::Resource;
use crate::time::{Clock, SystemClock};
use crate::trace::span_processor::{composite, SpanProcessor};
use crate::trace::{
    BatchSpanProcessor, IdGenerator, RandomIdGenerator, SdkTracer, SimpleSpanProcessor,
    SpanExporter, SpanLimits,
};
use crate::{otel_debug, otel_info};

// Placeholder returned for tracers requested after shutdown.
static NOOP_TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

fn noop_tracer_provider() -> &'static SdkTracerProvider {
    NOOP_TRACER_PROVIDER.get_or_init(|| SdkTracerProvider {
        inner: Arc::new(TracerProviderInner {
            processor: composite(Vec::new()),
            resource: Resource::empty(),
            clock: Arc::new(SystemClock::new()),
            limits_supplier: Box::new(SpanLimits::default),
            id_generator: Box::new(RandomIdGenerator),
            is_shutdown: AtomicBool::new(true),
            shutdown_result: Mutex::new(Some(CompletableResultCode::of_success())),
        }),
    })
}

/// Handles the creation and coordination of [`SdkTracer`]s.
///
/// All tracers created by one provider share the same clock, [`Resource`],
/// limits supplier, id generator and processor chain. The chain is composed
/// once at build time and never changes afterwards, so it can be read from
/// any thread without locking. This handle is cheap to clone; dropping the
/// last clone shuts the provider down.
#[derive(Debug, Clone)]
pub struct SdkTracerProvider {
    inner: Arc<TracerProviderInner>,
}

impl SdkTracerProvider {
    /// Create a new provider builder.
    pub fn builder() -> TracerProviderBuilder {
        TracerProviderBuilder::default()
    }

    /// Returns a tracer for the named instrumentation scope.
    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> SdkTracer {
        self.tracer_with_scope(InstrumentationScope::builder(name).build())
    }

    /// Returns a tracer for an explicit instrumentation scope.
    pub fn tracer_with_scope(&self, scope: InstrumentationScope) -> SdkTracer {
        if self.inner.is_shutdown() {
            otel_debug!(
                name: "TracerProvider.NoOpTracerReturned",
                tracer_name = scope.name()
            );
            return SdkTracer::new(scope, noop_tracer_provider().clone());
        }
        SdkTracer::new(scope, self.clone())
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

    pub(crate) fn inner(&self) -> &TracerProviderInner {
        &self.inner
    }
}

pub(crate) struct TracerProviderInner {
    processor: Box<dyn SpanProcessor>,
    resource: Resource,
    clock: Arc<dyn Clock>,
    limits_supplier: Box<dyn Fn() -> SpanLimits + Send + Sync>,
    id_generator: Box<dyn IdGenerator>,
    is_shutdown: AtomicBool,
    shutdown_result: Mutex<Option<CompletableResultCode>>,
}

impl std::fmt::Debug for TracerProviderInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracerProviderInner")
            .field("resource", &self.resource)
            .field("is_shutdown", &self.is_shutdown)
            .finish()
    }
}

impl TracerProviderInner {
    pub(crate) fn processor(&self) -> &dyn SpanProcessor {
        self.processor.as_ref()
    }

    pub(crate) fn clock_handle(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub(crate) fn span_limits(&self) -> SpanLimits {
        (self.limits_supplier)()
    }

    pub(crate) fn id_generator(&self) -> &dyn IdGenerator {
        self.id_generator.as_ref()
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
            otel_debug!(name: "TracerProvider.Shutdown.AlreadyShutdown");
            return existing.clone();
        }
        self.is_shutdown.store(true, Ordering::SeqCst);
        let token = self.processor.shutdown();
        *result = Some(token.clone());
        token
    }
}

impl Drop for TracerProviderInner {
    fn drop(&mut self) {
        if !self.is_shutdown() {
            otel_info!(
                name: "TracerProvider.Drop",
                message = "last reference dropped, initiating shutdown"
            );
            let _ = self.shutdown();
        }
    }
}

/// Builder for [`SdkTracerProvider`].
#[derive(Default)]
pub struct TracerProviderBuilder {
    processors: Vec<Box<dyn SpanProcessor>>,
    resource: Option<Resource>,
    clock: Option<Arc<dyn Clock>>,
    limits_supplier: Option<Box<dyn Fn() -> SpanLimits + Send + Sync>>,
    id_generator: Option<Box<dyn IdGenerator>>,
}

impl std::fmt::Debug for TracerProviderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracerProviderBuilder")
            .field("processors", &self.processors.len())
            .field("resource", &self.resource)
            .finish()
    }
}

impl TracerProviderBuilder {
    /// Adds a [`SimpleSpanProcessor`] over `exporter` to the pipeline.
    ///
    /// Processors are invoked in the order they are added.
    pub fn with_simple_exporter<T: SpanExporter + 'static>(self, exporter: T) -> Self {
        self.with_span_processor(SimpleSpanProcessor::new(exporter))
    }

    /// Adds a [`BatchSpanProcessor`] over `exporter` to the pipeline.
    ///
    /// Processors are invoked in the order they are added.
    pub fn with_batch_exporter<T: SpanExporter + 'static>(self, exporter: T) -> Self {
        self.with_span_processor(BatchSpanProcessor::new(exporter))
    }

    /// Adds a custom [`SpanProcessor`] to the pipeline.
    ///
    /// Processors are invoked in the order they are added.
    pub fn with_span_processor<T: SpanProcessor + 'static>(mut self, processor: T) -> Self {
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

    /// Fixed span limits for every span created from this provider.
    pub fn with_span_limits(self, limits: SpanLimits) -> Self {
        self.with_span_limits_supplier(move || limits)
    }

    /// A limits supplier re-consulted for every span, allowing limits to
    /// change between spans.
    pub fn with_span_limits_supplier(
        mut self,
        supplier: impl Fn() -> SpanLimits + Send + Sync + 'static,
    ) -> Self {
        self.limits_supplier = Some(Box::new(supplier));
        self
    }

    /// Replaces the id generator.
    pub fn with_id_generator<T: IdGenerator + 'static>(mut self, generator: T) -> Self {
        self.id_generator = Some(Box::new(generator));
        self
    }

    /// Create a provider from this configuration.
    pub fn build(self) -> SdkTracerProvider {
        let resource = self.resource.unwrap_or_default();

        let mut processors = self.processors;
        for processor in &mut processors {
            processor.set_resource(&resource);
        }

        let provider = SdkTracerProvider {
            inner: Arc::new(TracerProviderInner {
                processor: composite(processors),
                resource,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
                limits_supplier: self
                    .limits_supplier
                    .unwrap_or_else(|| Box::new(SpanLimits::default)),
                id_generator: self
                    .id_generator
                    .unwrap_or_else(|| Box::new(RandomIdGenerator)),
                is_shutdown: AtomicBool::new(false),
                shutdown_result: Mutex::new(None),
            }),
        };
        otel_debug!(name: "TracerProvider.Built");
        provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{InMemorySpanExporter, SpanData};
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Default)]
    struct CountingSpanProcessor {
        shutdowns: Arc<AtomicUsize>,
    }

    impl SpanProcessor for CountingSpanProcessor {
        fn on_end(&self, _span: SpanData) {}

        fn shutdown(&self) -> CompletableResultCode {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            CompletableResultCode::of_success()
        }
    }

    #[test]
    fn shutdown_is_one_shot_and_returns_same_token() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let provider = SdkTracerProvider::builder()
            .with_span_processor(CountingSpanProcessor {
                shutdowns: Arc::clone(&shutdowns),
            })
            .build();
        let first = provider.shutdown();
        let second = provider.shutdown();
        assert!(first.ptr_eq(&second));
        assert!(first.is_success());
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tracer_after_shutdown_is_noop() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        provider.shutdown();
        let tracer = provider.tracer("late");
        let mut span = tracer.start("ignored");
        span.end();
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }
}
