use std::ops::Deref;

use crate::common::KeyValue;
use crate::trace::SpanContext;

/// A causal reference from one span to another, possibly in another trace.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Link {
    /// The span context of the linked span.
    pub span_context: SpanContext,
    /// The link attributes.
    pub attributes: Vec<KeyValue>,
    /// The number of attributes that were above the configured limit.
    pub dropped_attributes_count: u32,
}

impl Link {
    /// Creates a new link.
    pub fn new(
        span_context: SpanContext,
        attributes: Vec<KeyValue>,
        dropped_attributes_count: u32,
    ) -> Self {
        Link {
            span_context,
            attributes,
            dropped_attributes_count,
        }
    }
}

/// The stored links of a span, plus the count of links dropped due to the
/// span's link limit.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct SpanLinks {
    /// The links recorded on the span.
    pub links: Vec<Link>,
    /// The number of links dropped due to limits.
    pub dropped_count: u32,
}

impl Deref for SpanLinks {
    type Target = [Link];

    fn deref(&self) -> &Self::Target {
        &self.links
    }
}

impl IntoIterator for SpanLinks {
    type Item = Link;
    type IntoIter = std::vec::IntoIter<Link>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.into_iter()
    }
}
