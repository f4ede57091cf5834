use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::common::InstrumentationScope;
use crate::completion::CompletableResultCode;
use crate::logs::log_processor::LogProcessor;
use crate::logs::{LogExporter, SdkLogRecord};
use crate::resource::Resource;
use crate::{otel_debug, otel_error, otel_warn};

/// A [`LogProcessor`] that exports each record as soon as it is emitted.
///
/// Every emit results in a single-record export call driven on the emitting
/// thread. That gives no batching and no backpressure, which makes this
/// processor suitable for debugging exporters (console, in-memory) and test
/// setups, not for high-volume production use; use [`BatchLogProcessor`]
/// there instead.
///
/// In-flight exports are tracked as completion tokens so `force_flush` can
/// wait on all of them.
///
/// [`BatchLogProcessor`]: crate::logs::BatchLogProcessor
#[derive(Debug)]
pub struct SimpleLogProcessor<T: LogExporter> {
    exporter: Mutex<T>,
    resource: Resource,
    pending_exports: Arc<Mutex<Vec<CompletableResultCode>>>,
    is_shutdown: AtomicBool,
}

impl<T: LogExporter> SimpleLogProcessor<T> {
    /// Creates a new simple processor over `exporter`.
    pub fn new(exporter: T) -> Self {
        SimpleLogProcessor {
            exporter: Mutex::new(exporter),
            resource: Resource::empty(),
            pending_exports: Arc::new(Mutex::new(Vec::new())),
            is_shutdown: AtomicBool::new(false),
        }
    }
}

impl<T: LogExporter> LogProcessor for SimpleLogProcessor<T> {
    fn emit(&self, record: &mut SdkLogRecord, scope: &InstrumentationScope) {
        if self.is_shutdown.load(Ordering::Relaxed) {
            otel_warn!(name: "SimpleLogProcessor.Emit.ProcessorShutdown");
            return;
        }

        let data = record.to_log_record_data(scope, &self.resource);
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
                futures_executor::block_on(exporter.export(vec![data])).map_err(|err| {
                    otel_error!(
                        name: "SimpleLogProcessor.Emit.ExportError",
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
            otel_debug!(name: "SimpleLogProcessor.Shutdown.AlreadyShutdown");
            return CompletableResultCode::of_success();
        }
        let flushed = self.force_flush();
        let result = CompletableResultCode::new();
        let exporter_result = match self.exporter.lock() {
            Ok(exporter) => exporter.shutdown().is_ok(),
            Err(_) => false,
        };
        let token = result.clone();
        flushed.when_complete(move |flush_ok| {
            if flush_ok && exporter_result {
                token.succeed();
            } else {
                token.fail();
            }
        });
        result
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource.clone();
        if let Ok(mut exporter) = self.exporter.lock() {
            exporter.set_resource(resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SdkError, SdkResult};
    use crate::logs::{InMemoryLogExporter, InMemoryLogExporterBuilder, LogRecordData, LogRecordLimits, SdkLoggerProvider};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn record() -> SdkLogRecord {
        SdkLogRecord::new(0, &LogRecordLimits::default())
    }

    #[test]
    fn exports_each_emit() {
        let exporter = InMemoryLogExporter::default();
        let processor = SimpleLogProcessor::new(exporter.clone());
        processor.emit(&mut record(), &InstrumentationScope::default());
        processor.emit(&mut record(), &InstrumentationScope::default());
        assert_eq!(exporter.get_emitted_logs().unwrap().len(), 2);
    }

    #[test]
    fn emit_after_shutdown_is_dropped() {
        let exporter = InMemoryLogExporterBuilder::default()
            .keep_records_on_shutdown()
            .build();
        let processor = SimpleLogProcessor::new(exporter.clone());

        processor.emit(&mut record(), &InstrumentationScope::default());
        assert!(processor.shutdown().join(std::time::Duration::from_secs(1)));
        assert!(exporter.is_shutdown_called());

        processor.emit(&mut record(), &InstrumentationScope::default());
        assert_eq!(exporter.get_emitted_logs().unwrap().len(), 1);
    }

    #[derive(Debug, Clone)]
    struct FailingExporter {
        calls: Arc<AtomicUsize>,
    }

    impl LogExporter for FailingExporter {
        async fn export(&self, _batch: Vec<LogRecordData>) -> SdkResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SdkError::InternalFailure("boom".into()))
        }
    }

    #[test]
    fn export_failure_does_not_propagate_to_caller() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = SdkLoggerProvider::builder()
            .with_simple_exporter(FailingExporter {
                calls: Arc::clone(&calls),
            })
            .build();
        let logger = provider.logger("failing");
        logger.emit(logger.create_log_record());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_emitters_all_export() {
        let exporter = InMemoryLogExporter::default();
        let processor = Arc::new(SimpleLogProcessor::new(exporter.clone()));

        let mut handles = vec![];
        for _ in 0..10 {
            let processor = Arc::clone(&processor);
            handles.push(tokio::spawn(async move {
                processor.emit(&mut record(), &InstrumentationScope::default());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(exporter.get_emitted_logs().unwrap().len(), 10);
    }
}
