use std::borrow::Cow;
use std::ops::Deref;

use crate::common::KeyValue;

/// A timed event happening during a span's lifetime.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Event {
    /// The name of this event.
    pub name: Cow<'static, str>,
    /// The event timestamp, nanoseconds since the unix epoch.
    pub timestamp: u64,
    /// The event attributes.
    pub attributes: Vec<KeyValue>,
    /// The number of attributes that were above the configured limit.
    pub dropped_attributes_count: u32,
}

impl Event {
    /// Creates a new event.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        timestamp: u64,
        attributes: Vec<KeyValue>,
        dropped_attributes_count: u32,
    ) -> Self {
        Event {
            name: name.into(),
            timestamp,
            attributes,
            dropped_attributes_count,
        }
    }
}

/// The stored events of a span, plus the count of events dropped due to the
/// span's event limit.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct SpanEvents {
    /// The events recorded on the span.
    pub events: Vec<Event>,
    /// The number of events dropped due to limits.
    pub dropped_count: u32,
}

impl Deref for SpanEvents {
    type Target = [Event];

    fn deref(&self) -> &Self::Target {
        &self.events
    }
}

impl IntoIterator for SpanEvents {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
