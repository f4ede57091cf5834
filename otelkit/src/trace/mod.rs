//! Span creation, processing and export.
//!
//! A [`SdkTracerProvider`] owns the shared state (clock, resource, limits,
//! processor chain) for every [`SdkTracer`] it hands out. Tracers start
//! mutable [`Span`]s; ending a span is its freeze transition: the span's
//! state is captured exactly once into an immutable [`SpanData`] snapshot and
//! handed synchronously to the processor chain.

mod batch_span_processor;
mod config;
mod console_exporter;
mod events;
mod export;
mod id_generator;
mod in_memory_exporter;
mod links;
mod provider;
mod span;
mod span_context;
mod span_processor;
mod tracer;

use std::borrow::Cow;

pub use batch_span_processor::BatchSpanProcessor;
pub use config::SpanLimits;
pub use console_exporter::ConsoleSpanExporter;
pub use events::{Event, SpanEvents};
pub use export::{SpanData, SpanExporter};
pub use id_generator::{IdGenerator, RandomIdGenerator};
pub use in_memory_exporter::InMemorySpanExporter;
pub use links::{Link, SpanLinks};
pub use provider::{SdkTracerProvider, TracerProviderBuilder};
pub use span::Span;
pub use span_context::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};
pub use span_processor::{MultiSpanProcessor, NoopSpanProcessor, SimpleSpanProcessor, SpanProcessor};
pub use tracer::{SdkTracer, SpanBuilder};

/// The relationship of a span to its parents and children in a trace.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SpanKind {
    /// Covers the client side of a synchronous remote call.
    Client,
    /// Covers the server side of a synchronous remote call.
    Server,
    /// Describes the initiator of an asynchronous request.
    Producer,
    /// Describes a child of an asynchronous producer request.
    Consumer,
    /// Default value, an internal operation within an application.
    Internal,
}

/// The status of a [`Span`].
///
/// Ordering is meaningful: a status can only be upgraded, never downgraded,
/// so `Ok` wins over `Error` wins over `Unset`.
#[derive(Clone, Debug, Default, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Status {
    /// The default status.
    #[default]
    Unset,
    /// The operation contains an error.
    Error {
        /// The description of the error.
        description: Cow<'static, str>,
    },
    /// The operation has been validated by an application developer or
    /// operator to have completed successfully.
    Ok,
}

impl Status {
    /// Create an error status with the given description.
    pub fn error(description: impl Into<Cow<'static, str>>) -> Self {
        Status::Error {
            description: description.into(),
        }
    }
}
