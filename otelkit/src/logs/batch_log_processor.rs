use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use futures_executor::block_on;

use crate::common::InstrumentationScope;
use crate::completion::CompletableResultCode;
use crate::logs::log_processor::LogProcessor;
use crate::logs::{LogExporter, LogRecordData, SdkLogRecord};
use crate::resource::Resource;
use crate::{otel_debug, otel_error, otel_warn};

/// Delay interval between two consecutive exports.
const OTEL_BLRP_SCHEDULE_DELAY: &str = "OTEL_BLRP_SCHEDULE_DELAY";
const OTEL_BLRP_SCHEDULE_DELAY_DEFAULT: u64 = 1_000;
/// Maximum queue size.
const OTEL_BLRP_MAX_QUEUE_SIZE: &str = "OTEL_BLRP_MAX_QUEUE_SIZE";
const OTEL_BLRP_MAX_QUEUE_SIZE_DEFAULT: usize = 2_048;
/// Maximum batch size, must be less than or equal to the max queue size.
const OTEL_BLRP_MAX_EXPORT_BATCH_SIZE: &str = "OTEL_BLRP_MAX_EXPORT_BATCH_SIZE";
const OTEL_BLRP_MAX_EXPORT_BATCH_SIZE_DEFAULT: usize = 512;

/// Batching configuration shared by the batch processors.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub(crate) max_queue_size: usize,
    pub(crate) scheduled_delay: Duration,
    pub(crate) max_export_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfigBuilder::default().build()
    }
}

impl BatchConfig {
    /// Creates a builder seeded from environment variables.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::default()
    }
}

/// Builder for [`BatchConfig`], seeded from `OTEL_BLRP_*` variables.
#[derive(Debug)]
pub struct BatchConfigBuilder {
    max_queue_size: usize,
    scheduled_delay: Duration,
    max_export_batch_size: usize,
}

impl Default for BatchConfigBuilder {
    fn default() -> Self {
        BatchConfigBuilder {
            max_queue_size: env_usize(OTEL_BLRP_MAX_QUEUE_SIZE, OTEL_BLRP_MAX_QUEUE_SIZE_DEFAULT),
            scheduled_delay: Duration::from_millis(env_u64(
                OTEL_BLRP_SCHEDULE_DELAY,
                OTEL_BLRP_SCHEDULE_DELAY_DEFAULT,
            )),
            max_export_batch_size: env_usize(
                OTEL_BLRP_MAX_EXPORT_BATCH_SIZE,
                OTEL_BLRP_MAX_EXPORT_BATCH_SIZE_DEFAULT,
            ),
        }
    }
}

fn env_usize(var: &str, default: usize) -> usize {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl BatchConfigBuilder {
    /// Sets the maximum number of records buffered before drops occur.
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Sets the delay between two consecutive scheduled exports.
    pub fn with_scheduled_delay(mut self, delay: Duration) -> Self {
        self.scheduled_delay = delay;
        self
    }

    /// Sets the maximum number of records sent in a single export call.
    pub fn with_max_export_batch_size(mut self, size: usize) -> Self {
        self.max_export_batch_size = size;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> BatchConfig {
        BatchConfig {
            max_queue_size: self.max_queue_size,
            scheduled_delay: self.scheduled_delay,
            // A batch can never exceed the queue it is drained from.
            max_export_batch_size: self.max_export_batch_size.min(self.max_queue_size),
        }
    }
}

#[derive(Debug)]
enum BatchMessage {
    Export(Box<LogRecordData>),
    ForceFlush(CompletableResultCode),
    Shutdown(CompletableResultCode),
}

/// A [`LogProcessor`] that buffers records and exports them in batches from a
/// dedicated background thread.
///
/// This is the production-grade processor: emits are cheap (a clone and a
/// non-blocking channel send), exports are batched by size and by time, and
/// records are dropped with a counter once the queue is full rather than
/// blocking the application.
#[derive(Debug)]
pub struct BatchLogProcessor {
    message_sender: SyncSender<BatchMessage>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    is_shutdown: AtomicBool,
    dropped_logs_count: Arc<AtomicUsize>,
    resource: Resource,
}

impl BatchLogProcessor {
    /// Creates a batch processor with the default configuration.
    pub fn new<E>(exporter: E) -> Self
    where
        E: LogExporter + 'static,
    {
        Self::with_config(exporter, BatchConfig::default())
    }

    /// Creates a batch processor with an explicit configuration.
    pub fn with_config<E>(exporter: E, config: BatchConfig) -> Self
    where
        E: LogExporter + 'static,
    {
        let (message_sender, message_receiver) = mpsc::sync_channel(config.max_queue_size);

        let handle = thread::Builder::new()
            .name("OtelBatchLogProcessor".to_string())
            .spawn(move || {
                let mut records: Vec<LogRecordData> = Vec::with_capacity(config.max_export_batch_size);
                let mut last_export = Instant::now();

                let export_batch = |records: &mut Vec<LogRecordData>| {
                    if records.is_empty() {
                        return true;
                    }
                    match block_on(exporter.export(records.split_off(0))) {
                        Ok(()) => true,
                        Err(err) => {
                            otel_error!(
                                name: "BatchLogProcessor.ExportError",
                                error = format!("{err}")
                            );
                            false
                        }
                    }
                };

                loop {
                    let timeout = config.scheduled_delay.saturating_sub(last_export.elapsed());
                    match message_receiver.recv_timeout(timeout) {
                        Ok(BatchMessage::Export(record)) => {
                            records.push(*record);
                            if records.len() >= config.max_export_batch_size {
                                export_batch(&mut records);
                                last_export = Instant::now();
                            }
                        }
                        Ok(BatchMessage::ForceFlush(result)) => {
                            if export_batch(&mut records) {
                                result.succeed();
                            } else {
                                result.fail();
                            }
                            last_export = Instant::now();
                        }
                        Ok(BatchMessage::Shutdown(result)) => {
                            let exported = export_batch(&mut records);
                            let exporter_ok = exporter.shutdown().is_ok();
                            if exported && exporter_ok {
                                result.succeed();
                            } else {
                                result.fail();
                            }
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            export_batch(&mut records);
                            last_export = Instant::now();
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            // All senders gone, drain what we have and stop.
                            export_batch(&mut records);
                            break;
                        }
                    }
                }
            })
            .expect("failed to spawn batch log processor thread");

        BatchLogProcessor {
            message_sender,
            handle: Mutex::new(Some(handle)),
            is_shutdown: AtomicBool::new(false),
            dropped_logs_count: Arc::new(AtomicUsize::new(0)),
            resource: Resource::empty(),
        }
    }

    /// Number of records dropped because the queue was full.
    pub fn dropped_logs_count(&self) -> usize {
        self.dropped_logs_count.load(Ordering::Relaxed)
    }
}

impl LogProcessor for BatchLogProcessor {
    fn emit(&self, record: &mut SdkLogRecord, scope: &InstrumentationScope) {
        if self.is_shutdown.load(Ordering::Relaxed) {
            otel_warn!(name: "BatchLogProcessor.Emit.ProcessorShutdown");
            return;
        }
        let data = record.to_log_record_data(scope, &self.resource);
        match self.message_sender.try_send(BatchMessage::Export(Box::new(data))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if self.dropped_logs_count.fetch_add(1, Ordering::Relaxed) == 0 {
                    otel_warn!(name: "BatchLogProcessor.Emit.QueueFull");
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                otel_debug!(name: "BatchLogProcessor.Emit.ChannelClosed");
            }
        }
    }

    fn force_flush(&self) -> CompletableResultCode {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return CompletableResultCode::of_failure();
        }
        let result = CompletableResultCode::new();
        if self
            .message_sender
            .try_send(BatchMessage::ForceFlush(result.clone()))
            .is_err()
        {
            result.fail();
        }
        result
    }

    fn shutdown(&self) -> CompletableResultCode {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return CompletableResultCode::of_success();
        }
        let dropped = self.dropped_logs_count.load(Ordering::Relaxed);
        if dropped > 0 {
            otel_warn!(
                name: "BatchLogProcessor.Shutdown.DroppedLogs",
                dropped_logs = dropped
            );
        }
        let result = CompletableResultCode::new();
        if self
            .message_sender
            .send(BatchMessage::Shutdown(result.clone()))
            .is_err()
        {
            result.fail();
        }
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(handle) = handle.take() {
                if handle.join().is_err() {
                    otel_error!(name: "BatchLogProcessor.Shutdown.ThreadPanicked");
                    return CompletableResultCode::of_failure();
                }
            }
        }
        result
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource.clone();
    }
}
