use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{SdkError, SdkResult};
use crate::logs::{LogExporter, LogRecordData};

/// An exporter that keeps exported records in memory, for tests and
/// debugging.
///
/// ```
/// use otelkit::logs::{InMemoryLogExporter, SdkLoggerProvider};
///
/// let exporter = InMemoryLogExporter::default();
/// let provider = SdkLoggerProvider::builder()
///     .with_simple_exporter(exporter.clone())
///     .build();
/// let logger = provider.logger("example");
/// logger.emit(logger.create_log_record());
/// assert_eq!(exporter.get_emitted_logs().unwrap().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryLogExporter {
    logs: Arc<Mutex<Vec<LogRecordData>>>,
    shutdown_called: Arc<AtomicBool>,
    reset_on_shutdown: bool,
}

impl Default for InMemoryLogExporter {
    fn default() -> Self {
        InMemoryLogExporterBuilder::default().build()
    }
}

/// Builder for [`InMemoryLogExporter`].
#[derive(Debug, Default)]
pub struct InMemoryLogExporterBuilder {
    keep_records_on_shutdown: bool,
}

impl InMemoryLogExporterBuilder {
    /// Keep the collected records across shutdown instead of clearing them.
    pub fn keep_records_on_shutdown(mut self) -> Self {
        self.keep_records_on_shutdown = true;
        self
    }

    /// Builds the exporter.
    pub fn build(self) -> InMemoryLogExporter {
        InMemoryLogExporter {
            logs: Arc::new(Mutex::new(Vec::new())),
            shutdown_called: Arc::new(AtomicBool::new(false)),
            reset_on_shutdown: !self.keep_records_on_shutdown,
        }
    }
}

impl InMemoryLogExporter {
    /// Returns a copy of everything exported so far.
    pub fn get_emitted_logs(&self) -> Result<Vec<LogRecordData>, SdkError> {
        self.logs
            .lock()
            .map(|logs| logs.clone())
            .map_err(|e| SdkError::InternalFailure(format!("lock poisoned: {e}")))
    }

    /// Discards everything exported so far.
    pub fn reset(&self) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.clear();
        }
    }

    /// Whether `shutdown` was called on this exporter.
    pub fn is_shutdown_called(&self) -> bool {
        self.shutdown_called.load(Ordering::Relaxed)
    }
}

impl LogExporter for InMemoryLogExporter {
    async fn export(&self, batch: Vec<LogRecordData>) -> SdkResult {
        let mut logs = self
            .logs
            .lock()
            .map_err(|e| SdkError::InternalFailure(format!("lock poisoned: {e}")))?;
        logs.extend(batch);
        Ok(())
    }

    fn shutdown(&self) -> SdkResult {
        self.shutdown_called.store(true, Ordering::Relaxed);
        if self.reset_on_shutdown {
            self.reset();
        }
        Ok(())
    }
}
