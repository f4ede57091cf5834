use std::fmt::Debug;

use crate::common::InstrumentationScope;
use crate::completion::CompletableResultCode;
use crate::logs::SdkLogRecord;
use crate::resource::Resource;

/// Hook observing log records as they are emitted.
///
/// Processors run synchronously on the emitting thread and must not panic or
/// block unboundedly. They receive a mutable reference to the record, so a
/// processor may still enrich it; changes are visible to processors later in
/// the chain and to the snapshot the exporting processor captures.
pub trait LogProcessor: Send + Sync + Debug {
    /// Called when a log record is emitted.
    fn emit(&self, record: &mut SdkLogRecord, scope: &InstrumentationScope);

    /// Exports any records the processor is still holding.
    fn force_flush(&self) -> CompletableResultCode {
        CompletableResultCode::of_success()
    }

    /// Flushes and releases resources. Must tolerate repeated calls.
    fn shutdown(&self) -> CompletableResultCode {
        self.force_flush()
    }

    /// Whether this processor needs to observe emit events at all.
    ///
    /// When no registered processor requires emit, the hot path skips record
    /// processing entirely.
    fn is_emit_required(&self) -> bool {
        true
    }

    /// Called once at provider construction with the provider resource.
    fn set_resource(&mut self, _resource: &Resource) {}
}

/// Composes a processor list into a single processor.
///
/// Zero processors compose to a noop, a single processor is used unwrapped,
/// two or more fan out through a [`MultiLogProcessor`].
pub(crate) fn composite(mut processors: Vec<Box<dyn LogProcessor>>) -> Box<dyn LogProcessor> {
    match processors.len() {
        0 => Box::new(NoopLogProcessor),
        1 => processors.remove(0),
        _ => Box::new(MultiLogProcessor::new(processors)),
    }
}

/// A processor that ignores everything.
#[derive(Debug, Default)]
pub struct NoopLogProcessor;

impl LogProcessor for NoopLogProcessor {
    fn emit(&self, _record: &mut SdkLogRecord, _scope: &InstrumentationScope) {}

    fn is_emit_required(&self) -> bool {
        false
    }
}

/// Forwards every event to a list of processors in registration order.
#[derive(Debug)]
pub struct MultiLogProcessor {
    processors: Vec<Box<dyn LogProcessor>>,
    // Indexes of the children that require emit, precomputed once.
    emit_indices: Vec<usize>,
    is_shutdown: std::sync::atomic::AtomicBool,
}

impl MultiLogProcessor {
    /// Creates a new multi processor over `processors`.
    pub fn new(processors: Vec<Box<dyn LogProcessor>>) -> Self {
        let emit_indices = processors
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_emit_required())
            .map(|(i, _)| i)
            .collect();
        MultiLogProcessor {
            processors,
            emit_indices,
            is_shutdown: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl LogProcessor for MultiLogProcessor {
    fn emit(&self, record: &mut SdkLogRecord, scope: &InstrumentationScope) {
        for &i in &self.emit_indices {
            self.processors[i].emit(record, scope);
        }
    }

    fn force_flush(&self) -> CompletableResultCode {
        CompletableResultCode::of_all(self.processors.iter().map(|p| p.force_flush()))
    }

    fn shutdown(&self) -> CompletableResultCode {
        if self
            .is_shutdown
            .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            return CompletableResultCode::of_success();
        }
        CompletableResultCode::of_all(self.processors.iter().map(|p| p.shutdown()))
    }

    fn is_emit_required(&self) -> bool {
        !self.emit_indices.is_empty()
    }

    fn set_resource(&mut self, resource: &Resource) {
        for processor in &mut self.processors {
            processor.set_resource(resource);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::common::{AnyValue, Key};
    use crate::logs::{LogRecordLimits, SdkLoggerProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub(crate) struct CountingProcessor {
        pub(crate) emits: Arc<AtomicUsize>,
        pub(crate) shutdowns: Arc<AtomicUsize>,
        pub(crate) emit_required: bool,
    }

    impl LogProcessor for CountingProcessor {
        fn emit(&self, _record: &mut SdkLogRecord, _scope: &InstrumentationScope) {
            self.emits.fetch_add(1, Ordering::SeqCst);
        }

        fn shutdown(&self) -> CompletableResultCode {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            CompletableResultCode::of_success()
        }

        fn is_emit_required(&self) -> bool {
            self.emit_required
        }
    }

    fn record() -> SdkLogRecord {
        SdkLogRecord::new(0, &LogRecordLimits::default())
    }

    #[test]
    fn multi_skips_children_not_requiring_emit() {
        let emits_a = Arc::new(AtomicUsize::new(0));
        let emits_b = Arc::new(AtomicUsize::new(0));
        let multi = MultiLogProcessor::new(vec![
            Box::new(CountingProcessor {
                emits: Arc::clone(&emits_a),
                emit_required: true,
                ..Default::default()
            }),
            Box::new(CountingProcessor {
                emits: Arc::clone(&emits_b),
                emit_required: false,
                ..Default::default()
            }),
        ]);
        assert!(multi.is_emit_required());
        multi.emit(&mut record(), &InstrumentationScope::default());
        assert_eq!(emits_a.load(Ordering::SeqCst), 1);
        assert_eq!(emits_b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn multi_shutdown_is_idempotent() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let multi = MultiLogProcessor::new(vec![Box::new(CountingProcessor {
            shutdowns: Arc::clone(&shutdowns),
            emit_required: true,
            ..Default::default()
        })]);
        assert!(multi.shutdown().is_success());
        assert!(multi.shutdown().is_success());
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug)]
    struct TaggingProcessor {
        tag: &'static str,
        seen: Arc<Mutex<Vec<(Option<AnyValue>, bool)>>>,
    }

    impl LogProcessor for TaggingProcessor {
        fn emit(&self, record: &mut SdkLogRecord, _scope: &InstrumentationScope) {
            let already_tagged = record.attributes_contains(
                &Key::from_static_str("processed_by"),
                &AnyValue::String("first".into()),
            );
            self.seen
                .lock()
                .unwrap()
                .push((record.body.clone(), already_tagged));
            record.add_attribute(Key::from_static_str("processed_by"), self.tag);
            record.body = Some(AnyValue::String(format!("updated by {}", self.tag).into()));
        }
    }

    #[test]
    fn later_processors_observe_earlier_mutations() {
        let seen_first = Arc::new(Mutex::new(Vec::new()));
        let seen_second = Arc::new(Mutex::new(Vec::new()));
        let provider = SdkLoggerProvider::builder()
            .with_log_processor(TaggingProcessor {
                tag: "first",
                seen: Arc::clone(&seen_first),
            })
            .with_log_processor(TaggingProcessor {
                tag: "second",
                seen: Arc::clone(&seen_second),
            })
            .build();

        let logger = provider.logger("multi-test");
        let mut record = logger.create_log_record();
        record.body = Some(AnyValue::String("original".into()));
        logger.emit(record);

        let first = seen_first.lock().unwrap();
        let second = seen_second.lock().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].0, Some(AnyValue::String("original".into())));
        assert!(!first[0].1);
        assert_eq!(second[0].0, Some(AnyValue::String("updated by first".into())));
        assert!(second[0].1);
    }
}
