use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{SdkError, SdkResult};
use crate::trace::{SpanData, SpanExporter};

/// An exporter that keeps finished spans in memory, for tests and debugging.
///
/// ```
/// use otelkit::trace::{InMemorySpanExporter, SdkTracerProvider};
///
/// let exporter = InMemorySpanExporter::default();
/// let provider = SdkTracerProvider::builder()
///     .with_simple_exporter(exporter.clone())
///     .build();
/// let tracer = provider.tracer("example");
/// tracer.start("op").end();
/// assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    shutdown_called: Arc<AtomicBool>,
}

impl InMemorySpanExporter {
    /// Returns a copy of everything exported so far.
    pub fn get_finished_spans(&self) -> Result<Vec<SpanData>, SdkError> {
        self.spans
            .lock()
            .map(|spans| spans.clone())
            .map_err(|e| SdkError::InternalFailure(format!("lock poisoned: {e}")))
    }

    /// Discards everything exported so far.
    pub fn reset(&self) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.clear();
        }
    }

    /// Whether `shutdown` was called on this exporter.
    pub fn is_shutdown_called(&self) -> bool {
        self.shutdown_called.load(Ordering::Relaxed)
    }
}

impl SpanExporter for InMemorySpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> SdkResult {
        let mut spans = self
            .spans
            .lock()
            .map_err(|e| SdkError::InternalFailure(format!("lock poisoned: {e}")))?;
        spans.extend(batch);
        Ok(())
    }

    fn shutdown(&self) -> SdkResult {
        self.shutdown_called.store(true, Ordering::Relaxed);
        Ok(())
    }
}
