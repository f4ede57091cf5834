use std::borrow::Cow;

use crate::attributes::AttributesMap;
use crate::common::{InstrumentationScope, KeyValue};
use crate::context::Context;
use crate::trace::span::SpanInner;
use crate::trace::{
    Link, Span, SpanContext, SpanEvents, SpanId, SpanKind, SpanLinks, Status, TraceFlags, TraceId,
};

/// Starts spans for one instrumentation scope.
///
/// Tracers are cheap handles onto the shared provider state; they can be
/// cloned freely and used from any thread.
#[derive(Debug, Clone)]
pub struct SdkTracer {
    scope: InstrumentationScope,
    provider: crate::trace::SdkTracerProvider,
}

impl SdkTracer {
    pub(crate) fn new(
        scope: InstrumentationScope,
        provider: crate::trace::SdkTracerProvider,
    ) -> Self {
        SdkTracer { scope, provider }
    }

    /// The instrumentation scope this tracer reports under.
    pub fn scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    pub(crate) fn provider(&self) -> &crate::trace::SdkTracerProvider {
        &self.provider
    }

    /// Returns a builder for a span named `name`.
    pub fn span_builder(&self, name: impl Into<Cow<'static, str>>) -> SpanBuilder {
        SpanBuilder::new(name)
    }

    /// Starts a span with default options, parented to the current context.
    pub fn start(&self, name: impl Into<Cow<'static, str>>) -> Span {
        self.span_builder(name).start(self)
    }
}

/// Fluent configuration accumulated before a span starts.
///
/// The builder is plain data; nothing happens until [`start`] assembles the
/// span against a tracer.
///
/// [`start`]: SpanBuilder::start
#[derive(Clone, Debug)]
pub struct SpanBuilder {
    name: Cow<'static, str>,
    span_kind: SpanKind,
    trace_id: Option<TraceId>,
    span_id: Option<SpanId>,
    trace_flags: Option<TraceFlags>,
    start_time: Option<u64>,
    attributes: Vec<KeyValue>,
    links: Vec<Link>,
}

impl SpanBuilder {
    fn new(name: impl Into<Cow<'static, str>>) -> Self {
        SpanBuilder {
            name: name.into(),
            span_kind: SpanKind::Internal,
            trace_id: None,
            span_id: None,
            trace_flags: None,
            start_time: None,
            attributes: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Specify the span kind.
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.span_kind = kind;
        self
    }

    /// Override the trace id instead of inheriting or generating one.
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Override the span id instead of generating one.
    pub fn with_span_id(mut self, span_id: SpanId) -> Self {
        self.span_id = Some(span_id);
        self
    }

    /// Override the trace flags instead of inheriting from the parent.
    pub fn with_trace_flags(mut self, flags: TraceFlags) -> Self {
        self.trace_flags = Some(flags);
        self
    }

    /// Explicit start time, nanoseconds since the unix epoch.
    pub fn with_start_time(mut self, nanos: u64) -> Self {
        self.start_time = Some(nanos);
        self
    }

    /// Initial attributes.
    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = KeyValue>) -> Self {
        self.attributes = attributes.into_iter().collect();
        self
    }

    /// Initial links.
    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    /// Starts the span, parented to the span active in the current context.
    pub fn start(self, tracer: &SdkTracer) -> Span {
        Context::map_current(|cx| self.start_with_context(tracer, cx))
    }

    /// Starts the span with an explicit parent context.
    pub fn start_with_context(self, tracer: &SdkTracer, cx: &Context) -> Span {
        let provider = tracer.provider();
        let inner = provider.inner();
        if inner.is_shutdown() {
            // A shut-down provider produces non-recording spans instead of
            // erroring at the call site.
            return Span::new(SpanContext::empty_context(), None, tracer.clone());
        }

        let parent = cx.span_context().filter(|p| p.is_valid());
        let id_generator = inner.id_generator();

        let trace_id = self
            .trace_id
            .or_else(|| parent.map(|p| p.trace_id()))
            .unwrap_or_else(|| id_generator.new_trace_id());
        let span_id = self.span_id.unwrap_or_else(|| id_generator.new_span_id());
        let trace_flags = self
            .trace_flags
            .or_else(|| parent.map(|p| p.trace_flags()))
            .unwrap_or(TraceFlags::SAMPLED);
        let trace_state = parent
            .map(|p| p.trace_state().clone())
            .unwrap_or_default();
        let parent_span_id = parent.map(|p| p.span_id()).unwrap_or(SpanId::INVALID);

        let span_context = SpanContext::new(trace_id, span_id, trace_flags, false, trace_state);

        let limits = inner.span_limits();
        let mut attributes = AttributesMap::new(
            limits.max_attributes_per_span as usize,
            limits.max_attribute_value_length.map(|l| l as usize),
        );
        for attribute in self.attributes {
            if attribute.key.as_str().is_empty() {
                continue;
            }
            attributes.put(attribute.key, attribute.value.into());
        }

        let mut links = SpanLinks::default();
        let max_links = limits.max_links_per_span as usize;
        for link in self.links {
            if links.links.len() >= max_links {
                links.dropped_count += 1;
            } else {
                links.links.push(link);
            }
        }

        let clock = crate::time::AnchoredClock::new(inner.clock_handle());
        let start_time = self.start_time.unwrap_or_else(|| clock.start_time());

        let mut span = Span::new(
            span_context,
            Some(SpanInner {
                parent_span_id,
                span_kind: self.span_kind,
                name: self.name,
                start_time,
                attributes,
                events: SpanEvents::default(),
                links,
                status: Status::Unset,
                limits,
                clock,
            }),
            tracer.clone(),
        );
        inner.processor().on_start(&mut span, cx);
        span
    }
}
