use std::fmt::Debug;
use std::future::Future;

use crate::error::SdkResult;
use crate::logs::LogRecordData;
use crate::resource::Resource;

/// A destination for immutable log record snapshots.
///
/// Implementations are driven by a [`LogProcessor`]; `export` may suspend
/// while awaiting I/O and is awaited through the processor's completion
/// tokens rather than blocking the emitting thread inside the exporter.
///
/// [`LogProcessor`]: crate::logs::LogProcessor
pub trait LogExporter: Send + Sync + Debug {
    /// Exports a batch of log records.
    fn export(&self, batch: Vec<LogRecordData>) -> impl Future<Output = SdkResult> + Send;

    /// Shuts down the exporter. Exports after shutdown fail.
    fn shutdown(&self) -> SdkResult {
        Ok(())
    }

    /// Flushes any buffered state, best effort.
    fn force_flush(&self) -> SdkResult {
        Ok(())
    }

    /// Called once at provider construction with the provider resource.
    fn set_resource(&mut self, _resource: &Resource) {}
}
