use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use futures_executor::block_on;

use crate::completion::CompletableResultCode;
use crate::trace::span_processor::SpanProcessor;
use crate::trace::{SpanData, SpanExporter};
use crate::{otel_debug, otel_error, otel_warn};

/// Delay interval between two consecutive exports.
const OTEL_BSP_SCHEDULE_DELAY: &str = "OTEL_BSP_SCHEDULE_DELAY";
const OTEL_BSP_SCHEDULE_DELAY_DEFAULT: u64 = 5_000;
/// Maximum queue size.
const OTEL_BSP_MAX_QUEUE_SIZE: &str = "OTEL_BSP_MAX_QUEUE_SIZE";
const OTEL_BSP_MAX_QUEUE_SIZE_DEFAULT: usize = 2_048;
/// Maximum batch size, must be less than or equal to the max queue size.
const OTEL_BSP_MAX_EXPORT_BATCH_SIZE: &str = "OTEL_BSP_MAX_EXPORT_BATCH_SIZE";
const OTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT: usize = 512;

#[derive(Debug, Clone)]
struct BatchSpanConfig {
    max_queue_size: usize,
    scheduled_delay: Duration,
    max_export_batch_size: usize,
}

impl Default for BatchSpanConfig {
    fn default() -> Self {
        let max_queue_size = env_usize(OTEL_BSP_MAX_QUEUE_SIZE, OTEL_BSP_MAX_QUEUE_SIZE_DEFAULT);
        BatchSpanConfig {
            max_queue_size,
            scheduled_delay: Duration::from_millis(env_u64(
                OTEL_BSP_SCHEDULE_DELAY,
                OTEL_BSP_SCHEDULE_DELAY_DEFAULT,
            )),
            max_export_batch_size: env_usize(
                OTEL_BSP_MAX_EXPORT_BATCH_SIZE,
                OTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT,
            )
            .min(max_queue_size),
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

#[derive(Debug)]
enum BatchMessage {
    Export(Box<SpanData>),
    ForceFlush(CompletableResultCode),
    Shutdown(CompletableResultCode),
}

/// A [`SpanProcessor`] that buffers finished spans and exports them in
/// batches from a dedicated background thread.
///
/// This is the production-grade processor: span ends are cheap (a
/// non-blocking channel send), exports are batched by size and by time, and
/// spans are dropped with a counter once the queue is full rather than
/// blocking the application.
#[derive(Debug)]
pub struct BatchSpanProcessor {
    message_sender: SyncSender<BatchMessage>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    is_shutdown: AtomicBool,
    dropped_spans_count: Arc<AtomicUsize>,
}

impl BatchSpanProcessor {
    /// Creates a batch processor with configuration taken from the
    /// `OTEL_BSP_*` environment variables, falling back to the defaults.
    pub fn new<E>(exporter: E) -> Self
    where
        E: SpanExporter + 'static,
    {
        Self::with_config(exporter, BatchSpanConfig::default())
    }

    fn with_config<E>(exporter: E, config: BatchSpanConfig) -> Self
    where
        E: SpanExporter + 'static,
    {
        let (message_sender, message_receiver) = mpsc::sync_channel(config.max_queue_size);

        let handle = thread::Builder::new()
            .name("OtelBatchSpanProcessor".to_string())
            .spawn(move || {
                let mut spans: Vec<SpanData> = Vec::with_capacity(config.max_export_batch_size);
                let mut last_export = Instant::now();

                let export_batch = |spans: &mut Vec<SpanData>| {
                    if spans.is_empty() {
                        return true;
                    }
                    match block_on(exporter.export(spans.split_off(0))) {
                        Ok(()) => true,
                        Err(err) => {
                            otel_error!(
                                name: "BatchSpanProcessor.ExportError",
                                error = format!("{err}")
                            );
                            false
                        }
                    }
                };

                loop {
                    let timeout = config.scheduled_delay.saturating_sub(last_export.elapsed());
                    match message_receiver.recv_timeout(timeout) {
                        Ok(BatchMessage::Export(span)) => {
                            spans.push(*span);
                            if spans.len() >= config.max_export_batch_size {
                                export_batch(&mut spans);
                                last_export = Instant::now();
                            }
                        }
                        Ok(BatchMessage::ForceFlush(result)) => {
                            if export_batch(&mut spans) {
                                result.succeed();
                            } else {
                                result.fail();
                            }
                            last_export = Instant::now();
                        }
                        Ok(BatchMessage::Shutdown(result)) => {
                            let exported = export_batch(&mut spans);
                            let exporter_ok = exporter.shutdown().is_ok();
                            if exported && exporter_ok {
                                result.succeed();
                            } else {
                                result.fail();
                            }
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            export_batch(&mut spans);
                            last_export = Instant::now();
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            export_batch(&mut spans);
                            break;
                        }
                    }
                }
            })
            .expect("failed to spawn batch span processor thread");

        BatchSpanProcessor {
            message_sender,
            handle: Mutex::new(Some(handle)),
            is_shutdown: AtomicBool::new(false),
            dropped_spans_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of spans dropped because the queue was full.
    pub fn dropped_spans_count(&self) -> usize {
        self.dropped_spans_count.load(Ordering::Relaxed)
    }
}

impl SpanProcessor for BatchSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if self.is_shutdown.load(Ordering::Relaxed) {
            otel_warn!(name: "BatchSpanProcessor.OnEnd.ProcessorShutdown");
            return;
        }
        if !span.span_context.is_sampled() {
            return;
        }
        match self.message_sender.try_send(BatchMessage::Export(Box::new(span))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if self.dropped_spans_count.fetch_add(1, Ordering::Relaxed) == 0 {
                    otel_warn!(name: "BatchSpanProcessor.OnEnd.QueueFull");
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                otel_debug!(name: "BatchSpanProcessor.OnEnd.ChannelClosed");
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
        let dropped = self.dropped_spans_count.load(Ordering::Relaxed);
        if dropped > 0 {
            otel_warn!(
                name: "BatchSpanProcessor.Shutdown.DroppedSpans",
                dropped_spans = dropped
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
                    otel_error!(name: "BatchSpanProcessor.Shutdown.ThreadPanicked");
                    return CompletableResultCode::of_failure();
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{InMemorySpanExporter, SdkTracerProvider};

    #[test]
    fn flush_exports_buffered_spans() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("batch");
        for _ in 0..3 {
            let mut span = tracer.start("op");
            span.end();
        }
        assert!(provider
            .force_flush()
            .join(Duration::from_secs(5)));
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 3);
        assert!(provider.shutdown().join(Duration::from_secs(5)));
    }

    #[test]
    fn shutdown_drains_remaining_spans() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("batch");
        let mut span = tracer.start("op");
        span.end();
        assert!(provider.shutdown().join(Duration::from_secs(5)));
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
        assert!(exporter.is_shutdown_called());
    }
}
