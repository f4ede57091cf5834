use std::borrow::Cow;

use crate::attributes::AttributesMap;
use crate::common::KeyValue;
use crate::context::{Context, ContextGuard};
use crate::trace::{
    Event, Link, SpanContext, SpanEvents, SpanId, SpanKind, SpanLimits, SpanLinks, Status,
};

/// A single operation within a trace.
///
/// A span is mutable while it is active: attributes, events, links, name and
/// status can all still change. Ending the span is its freeze transition; it
/// happens at most once, and every setter called after that point is a silent
/// no-op. A span that is dropped without being ended explicitly ends itself
/// with the current clock time.
#[derive(Debug)]
pub struct Span {
    span_context: SpanContext,
    inner: Option<SpanInner>,
    tracer: crate::trace::SdkTracer,
}

#[derive(Debug)]
pub(crate) struct SpanInner {
    pub(crate) parent_span_id: SpanId,
    pub(crate) span_kind: SpanKind,
    pub(crate) name: Cow<'static, str>,
    pub(crate) start_time: u64,
    pub(crate) attributes: AttributesMap,
    pub(crate) events: SpanEvents,
    pub(crate) links: SpanLinks,
    pub(crate) status: Status,
    pub(crate) limits: SpanLimits,
    // Anchored when the span started; all further timestamps for this span
    // derive from it, keeping them consistent under wall-clock adjustments.
    pub(crate) clock: crate::time::AnchoredClock,
}

impl Span {
    pub(crate) fn new(
        span_context: SpanContext,
        inner: Option<SpanInner>,
        tracer: crate::trace::SdkTracer,
    ) -> Self {
        Span {
            span_context,
            inner,
            tracer,
        }
    }

    /// Returns the `SpanContext` for this span.
    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// Returns `true` while the span is recording information.
    ///
    /// Spans stop recording once ended, and spans created from a shut-down
    /// provider never record at all.
    pub fn is_recording(&self) -> bool {
        self.inner.is_some()
    }

    /// Sets a single attribute. No-op after the span has ended.
    pub fn set_attribute(&mut self, attribute: KeyValue) {
        if let Some(inner) = self.inner.as_mut() {
            if attribute.key.as_str().is_empty() {
                return;
            }
            inner.attributes.put(attribute.key, attribute.value.into());
        }
    }

    /// Sets multiple attributes. No-op after the span has ended.
    pub fn set_attributes(&mut self, attributes: impl IntoIterator<Item = KeyValue>) {
        for attribute in attributes {
            self.set_attribute(attribute);
        }
    }

    /// Records an event at the current time.
    pub fn add_event(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        attributes: Vec<KeyValue>,
    ) {
        let Some(now) = self.inner.as_ref().map(|inner| inner.clock.now()) else {
            return;
        };
        self.add_event_with_timestamp(name, now, attributes);
    }

    /// Records an event at an explicit time.
    pub fn add_event_with_timestamp(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        timestamp: u64,
        mut attributes: Vec<KeyValue>,
    ) {
        if let Some(inner) = self.inner.as_mut() {
            if inner.events.events.len() >= inner.limits.max_events_per_span as usize {
                inner.events.dropped_count += 1;
                return;
            }
            let dropped = truncate_attributes(
                &mut attributes,
                inner.limits.max_attributes_per_event as usize,
            );
            inner
                .events
                .events
                .push(Event::new(name, timestamp, attributes, dropped));
        }
    }

    /// Adds a link to another span.
    pub fn add_link(&mut self, span_context: SpanContext, mut attributes: Vec<KeyValue>) {
        if let Some(inner) = self.inner.as_mut() {
            if inner.links.links.len() >= inner.limits.max_links_per_span as usize {
                inner.links.dropped_count += 1;
                return;
            }
            let dropped = truncate_attributes(
                &mut attributes,
                inner.limits.max_attributes_per_link as usize,
            );
            inner
                .links
                .links
                .push(Link::new(span_context, attributes, dropped));
        }
    }

    /// Updates the span's operation name.
    pub fn update_name(&mut self, new_name: impl Into<Cow<'static, str>>) {
        if let Some(inner) = self.inner.as_mut() {
            inner.name = new_name.into();
        }
    }

    /// Sets the status of this span. A status can only be upgraded
    /// (`Unset` → `Error` → `Ok`), downgrade attempts are ignored.
    pub fn set_status(&mut self, status: Status) {
        if let Some(inner) = self.inner.as_mut() {
            if status > inner.status {
                inner.status = status;
            }
        }
    }

    /// Installs this span's context as the active one on the current thread
    /// until the returned guard is dropped.
    pub fn make_current(&self) -> ContextGuard {
        Context::current()
            .with_span_context(self.span_context.clone())
            .attach()
    }

    /// Ends the span with the current clock time.
    ///
    /// Exactly one end transition happens per span; repeat calls are no-ops
    /// and the snapshot reflects the state at the first call.
    pub fn end(&mut self) {
        self.do_end(None);
    }

    /// Ends the span with an explicit timestamp.
    pub fn end_with_timestamp(&mut self, end_time: u64) {
        self.do_end(Some(end_time));
    }

    fn do_end(&mut self, end_time: Option<u64>) {
        let Some(inner) = self.inner.take() else {
            return; // already ended
        };
        let provider = self.tracer.provider();
        let processor = provider.inner().processor();
        if !processor.is_end_required() {
            return;
        }
        let end_time = end_time.unwrap_or_else(|| inner.clock.now());
        let data = crate::trace::SpanData {
            span_context: self.span_context.clone(),
            parent_span_id: inner.parent_span_id,
            span_kind: inner.span_kind,
            name: inner.name,
            start_time: inner.start_time,
            end_time,
            attributes: inner.attributes,
            events: inner.events,
            links: inner.links,
            status: inner.status,
            resource: provider.resource().clone(),
            scope: self.tracer.scope().clone(),
        };
        processor.on_end(data);
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if self.inner.is_some() {
            self.do_end(None);
        }
    }
}

fn truncate_attributes(attributes: &mut Vec<KeyValue>, limit: usize) -> u32 {
    let dropped = attributes.len().saturating_sub(limit) as u32;
    attributes.truncate(limit);
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{InMemorySpanExporter, SdkTracerProvider};

    fn test_setup() -> (InMemorySpanExporter, SdkTracerProvider) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (exporter, provider)
    }

    #[test]
    fn ending_twice_notifies_processor_once() {
        let (exporter, provider) = test_setup();
        let tracer = provider.tracer("span-test");
        let mut span = tracer.span_builder("op").start(&tracer);
        span.set_attribute(KeyValue::new("k", "v"));
        span.end();
        span.set_attribute(KeyValue::new("late", "ignored"));
        span.end();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].attributes.len(), 1);
        assert!(spans[0]
            .attributes
            .get(&crate::Key::new("late"))
            .is_none());
    }

    #[test]
    fn snapshot_matches_state_at_first_end() {
        let (exporter, provider) = test_setup();
        let tracer = provider.tracer("span-test");
        let mut span = tracer.span_builder("before").start(&tracer);
        span.update_name("after");
        span.end_with_timestamp(99);
        span.update_name("much-later");

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans[0].name, "after");
        assert_eq!(spans[0].end_time, 99);
    }

    #[test]
    fn drop_ends_span() {
        let (exporter, provider) = test_setup();
        let tracer = provider.tracer("span-test");
        {
            let _span = tracer.span_builder("dropped").start(&tracer);
        }
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
    }

    #[test]
    fn status_only_upgrades() {
        let (exporter, provider) = test_setup();
        let tracer = provider.tracer("span-test");
        let mut span = tracer.span_builder("status").start(&tracer);
        span.set_status(Status::Ok);
        span.set_status(Status::error("downgrade attempt"));
        span.end();
        assert_eq!(exporter.get_finished_spans().unwrap()[0].status, Status::Ok);
    }

    #[test]
    fn event_and_link_limits_count_drops() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_span_limits(SpanLimits {
                max_events_per_span: 1,
                max_links_per_span: 1,
                ..Default::default()
            })
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("limits");
        let mut span = tracer.span_builder("op").start(&tracer);
        span.add_event("first", vec![]);
        span.add_event("second", vec![]);
        span.add_link(SpanContext::empty_context(), vec![]);
        span.add_link(SpanContext::empty_context(), vec![]);
        span.end();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans[0].events.events.len(), 1);
        assert_eq!(spans[0].events.dropped_count, 1);
        assert_eq!(spans[0].links.links.len(), 1);
        assert_eq!(spans[0].links.dropped_count, 1);
    }
}
