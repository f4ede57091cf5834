use std::borrow::Cow;
use std::fmt::Debug;
use std::future::Future;

use crate::attributes::AttributesMap;
use crate::common::InstrumentationScope;
use crate::error::SdkResult;
use crate::resource::Resource;
use crate::trace::{SpanContext, SpanEvents, SpanId, SpanKind, SpanLinks, Status};

/// An immutable span snapshot handed to exporters.
///
/// Snapshots own all of their data, including the [`Resource`] and
/// [`InstrumentationScope`] identities used for grouping on the wire, and
/// keep no reference to the span they were captured from.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct SpanData {
    /// The span context of this span.
    pub span_context: SpanContext,
    /// The parent's span id, invalid for root spans.
    pub parent_span_id: SpanId,
    /// The span kind.
    pub span_kind: SpanKind,
    /// The operation name.
    pub name: Cow<'static, str>,
    /// Start time, nanoseconds since the unix epoch.
    pub start_time: u64,
    /// End time, nanoseconds since the unix epoch.
    pub end_time: u64,
    /// Span attributes.
    pub attributes: AttributesMap,
    /// Span events.
    pub events: SpanEvents,
    /// Span links.
    pub links: SpanLinks,
    /// Span status.
    pub status: Status,
    /// The entity that produced this span.
    pub resource: Resource,
    /// The library that produced this span.
    pub scope: InstrumentationScope,
}

impl SpanData {
    /// Total attribute set attempts, including dropped ones.
    pub fn total_attribute_count(&self) -> u32 {
        self.attributes.total_added()
    }

    /// Attribute attempts dropped due to limits.
    pub fn dropped_attributes_count(&self) -> u32 {
        self.attributes.dropped_count()
    }
}

/// A destination for immutable span snapshots.
///
/// Implementations are driven by a [`SpanProcessor`]; `export` may suspend
/// while awaiting I/O.
///
/// [`SpanProcessor`]: crate::trace::SpanProcessor
pub trait SpanExporter: Send + Sync + Debug {
    /// Exports a batch of spans.
    fn export(&self, batch: Vec<SpanData>) -> impl Future<Output = SdkResult> + Send;

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
