use std::fmt::Debug;

use rand::Rng;

use crate::trace::{SpanId, TraceId};

/// Generates new trace and span ids.
pub trait IdGenerator: Send + Sync + Debug {
    /// Generate a new trace id.
    fn new_trace_id(&self) -> TraceId;

    /// Generate a new span id.
    fn new_span_id(&self) -> SpanId;
}

/// Generates ids from the thread-local random number generator.
#[derive(Clone, Debug, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        TraceId::from(rand::rng().random::<u128>())
    }

    fn new_span_id(&self) -> SpanId {
        SpanId::from(rand::rng().random::<u64>())
    }
}
