use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::completion::CompletableResultCode;
use crate::context::Context;
use crate::resource::Resource;
use crate::trace::{Span, SpanData, SpanExporter};
use crate::{otel_debug, otel_error, otel_warn};

/// Hook observing span start and end.
///
/// Processors run synchronously inside `Span::end` on the ending thread and
/// must not panic or block unboundedly. Unlike log processors, span
/// processors observe a finalized immutable [`SpanData`] snapshot: the span
/// freezes before the chain sees it.
pub trait SpanProcessor: Send + Sync + Debug {
    /// Called when a span is started. The span is still mutable here.
    fn on_start(&self, _span: &mut Span, _cx: &Context) {}

    /// Called after a span has ended with its frozen snapshot.
    fn on_end(&self, span: SpanData);

    /// Exports any spans the processor is still holding.
    fn force_flush(&self) -> CompletableResultCode {
        CompletableResultCode::of_success()
    }

    /// Flushes and releases resources. Must tolerate repeated calls.
    fn shutdown(&self) -> CompletableResultCode {
        self.force_flush()
    }

    /// Whether this processor needs to observe span end at all.
    ///
    /// When no registered processor requires it, `Span::end` skips snapshot
    /// assembly entirely.
    fn is_end_required(&self) -> bool {
        true
    }

    /// Called once at provider construction with the provider resource.
    fn set_resource(&mut self, _resource: &Resource) {}
}

/// Composes a processor list into a single processor.
///
/// Zero processors compose to a noop, a single processor is used unwrapped,
/// two or more fan out through a [`MultiSpanProcessor`].
pub(crate) fn composite(mut processors: Vec<Box<dyn SpanProcessor>>) -> Box<dyn SpanProcessor> {
    match processors.len() {
        0 => Box::new(NoopSpanProcessor),
        1 => processors.remove(0),
        _ => Box::new(MultiSpanProcessor::new(processors)),
    }
}

/// A processor that ignores everything.
#[derive(Debug, Default)]
pub struct NoopSpanProcessor;

impl SpanProcessor for NoopSpanProcessor {
    fn on_end(&self, _span: SpanData) {}

    fn is_end_required(&self) -> bool {
        false
    }
}

/// Forwards every event to a list of processors in registration order.
#[derive(Debug)]
pub struct MultiSpanProcessor {
    processors: Vec<Box<dyn SpanProcessor>>,
    end_indices: Vec<usize>,
    is_shutdown: AtomicBool,
}

impl MultiSpanProcessor {
    /// Creates a new multi processor over `processors`.
    pub fn new(processors: Vec<Box<dyn SpanProcessor>>) -> Self {
        let end_indices = processors
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_end_required())
            .map(|(i, _)| i)
            .collect();
        MultiSpanProcessor {
            processors,
            end_indices,
            is_shutdown: AtomicBool::new(false),
        }
    }
}

impl SpanProcessor for MultiSpanProcessor {
    fn on_start(&self, span: &mut Span, cx: &Context) {
        for processor in &self.processors {
            processor.on_start(span, cx);
        }
    }

    fn on_end(&self, span: SpanData) {
        for &i in &self.end_indices {
            self.processors[i].on_end(span.clone());
        }
    }

    fn force_flush(&self) -> CompletableResultCode {
        CompletableResultCode::of_all(self.processors.iter().map(|p| p.force_flush()))
    }

    fn shutdown(&self) -> CompletableResultCode {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return CompletableResultCode::of_success();
        }
        CompletableResultCode::of_all(self.processors.iter().map(|p| p.shutdown()))
    }

    fn is_end_required(&self) -> bool {
        !self.end_indices.is_empty()
    }

    fn set_resource(&mut self, resource: &Resource) {
        for processor in &mut self.processors {
            processor.set_resource(resource);
        }
    }
}

/// A [`SpanProcessor`] that exports each span as soon as it ends.
///
/// Only sampled spans are exported. Every span end results in a single-span
/// export call driven on the ending thread, which makes this processor
/// suitable for debugging and testing, not for high-throughput production
/// use; use [`BatchSpanProcessor`] there instead.
///
/// [`BatchSpanProcessor`]: crate::trace::BatchSpanProcessor
#[derive(Debug)]
pub struct SimpleSpanProcessor<T: SpanExporter> {
    exporter: Mutex<T>,
    pending_exports: Arc<Mutex<Vec<CompletableResultCode>>>,
    is_shutdown: AtomicBool,
}

impl<T: SpanExporter> SimpleSpanProcessor<T> {
    /// Creates a new simple processor over `exporter`.
    pub fn new(exporter: T) -> Self {
        SimpleSpanProcessor {
            exporter: Mutex::new(exporter),
            pending_exports: Arc::new(Mutex::new(Vec::new())),
            is_shutdown: AtomicBool::new(false),
        }
    }
}

impl<T: SpanExporter> SpanProcessor for SimpleSpanProcessor<T> {
    fn on_end(&self, span: SpanData) {
        if self.is_shutdown.load(Ordering::Relaxed) {
            otel_warn!(name: "SimpleSpanProcessor.OnEnd.ProcessorShutdown");
            return;
        }
        if !span.span_context.is_sampled() {
            return;
        }

        let result = CompletableResultCode::new();
        if let Ok(mut pending) = self.pending_exports.lock() {
            pending.push(result.clone());
        }
        {
            let pending = Arc::clone(&self.pending_exports);
            let token = result.clone();
            result.when_complete(move |_| {
                if let Ok(mut pending) = pending.lock() {
                    pending.retain(|p| !p.ptr_eq(&token));
                }
            });
        }

        let export_result = self
            .exporter
            .lock()
            .map_err(|_| ())
            .and_then(|exporter| {
                futures_executor::block_on(exporter.export(vec![span])).map_err(|err| {
                    otel_error!(
                        name: "SimpleSpanProcessor.OnEnd.ExportError",
                        error = format!("{err}")
                    );
                })
            });
        match export_result {
            Ok(()) => {
                result.succeed();
            }
            Err(()) => {
                result.fail();
            }
        }
    }

    fn force_flush(&self) -> CompletableResultCode {
        let pending = match self.pending_exports.lock() {
            Ok(pending) => pending.clone(),
            Err(_) => return CompletableResultCode::of_failure(),
        };
        CompletableResultCode::of_all(pending)
    }

    fn shutdown(&self) -> CompletableResultCode {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            otel_debug!(name: "SimpleSpanProcessor.Shutdown.AlreadyShutdown");
            return CompletableResultCode::of_success();
        }
        let flushed = self.force_flush();
        let exporter_ok = match self.exporter.lock() {
            Ok(exporter) => exporter.shutdown().is_ok(),
            Err(_) => false,
        };
        let result = CompletableResultCode::new();
        let token = result.clone();
        flushed.when_complete(move |flush_ok| {
            if flush_ok && exporter_ok {
                token.succeed();
            } else {
                token.fail();
            }
        });
        result
    }

    fn set_resource(&mut self, resource: &Resource) {
        if let Ok(mut exporter) = self.exporter.lock() {
            exporter.set_resource(resource);
        }
    }
}
