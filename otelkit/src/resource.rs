//! The entity producing telemetry, described as a set of attributes.

use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::common::{Key, KeyValue, Value};

const SERVICE_NAME: &str = "service.name";
const TELEMETRY_SDK_NAME: &str = "telemetry.sdk.name";
const TELEMETRY_SDK_VERSION: &str = "telemetry.sdk.version";
const TELEMETRY_SDK_LANGUAGE: &str = "telemetry.sdk.language";

/// An immutable representation of the entity producing telemetry.
///
/// Two resources with equal attributes and schema URL are interchangeable
/// grouping keys on export, regardless of which provider created them.
/// Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

#[derive(Debug)]
struct ResourceInner {
    attrs: HashMap<Key, Value>,
    schema_url: Option<Cow<'static, str>>,
}

impl PartialEq for ResourceInner {
    fn eq(&self, other: &Self) -> bool {
        self.attrs == other.attrs && self.schema_url == other.schema_url
    }
}

impl Eq for ResourceInner {}

impl Hash for ResourceInner {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut entries: Vec<_> = self.attrs.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (k, v) in entries {
            k.hash(state);
            // Value is not Hash (f64); hash the display form instead.
            v.to_string().hash(state);
        }
        self.schema_url.hash(state);
    }
}

impl Default for Resource {
    fn default() -> Self {
        Resource::builder().build()
    }
}

impl Resource {
    /// Creates a builder pre-populated with the default SDK attributes
    /// (`service.name`, `telemetry.sdk.*`).
    pub fn builder() -> ResourceBuilder {
        ResourceBuilder {
            attrs: default_attributes(),
            schema_url: None,
        }
    }

    /// Creates a builder with no attributes at all.
    pub fn builder_empty() -> ResourceBuilder {
        ResourceBuilder {
            attrs: HashMap::new(),
            schema_url: None,
        }
    }

    /// A resource with no attributes and no schema URL.
    pub fn empty() -> Self {
        Resource {
            inner: Arc::new(ResourceInner {
                attrs: HashMap::new(),
                schema_url: None,
            }),
        }
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.inner.attrs.get(key)
    }

    /// Iterates the resource attributes in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.inner.attrs.iter()
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.inner.attrs.len()
    }

    /// Whether the resource carries no attributes.
    pub fn is_empty(&self) -> bool {
        self.inner.attrs.is_empty()
    }

    /// The schema URL, if one was configured.
    pub fn schema_url(&self) -> Option<&str> {
        self.inner.schema_url.as_deref()
    }
}

fn default_attributes() -> HashMap<Key, Value> {
    HashMap::from([
        (Key::from_static_str(SERVICE_NAME), "unknown_service".into()),
        (
            Key::from_static_str(TELEMETRY_SDK_NAME),
            env!("CARGO_PKG_NAME").into(),
        ),
        (
            Key::from_static_str(TELEMETRY_SDK_VERSION),
            env!("CARGO_PKG_VERSION").into(),
        ),
        (Key::from_static_str(TELEMETRY_SDK_LANGUAGE), "rust".into()),
    ])
}

/// Builder for [`Resource`].
#[derive(Debug)]
pub struct ResourceBuilder {
    attrs: HashMap<Key, Value>,
    schema_url: Option<Cow<'static, str>>,
}

impl ResourceBuilder {
    /// Adds or replaces a single attribute.
    pub fn with_attribute(mut self, kv: KeyValue) -> Self {
        self.attrs.insert(kv.key, kv.value);
        self
    }

    /// Adds or replaces multiple attributes.
    pub fn with_attributes<I: IntoIterator<Item = KeyValue>>(mut self, attrs: I) -> Self {
        self.attrs
            .extend(attrs.into_iter().map(|kv| (kv.key, kv.value)));
        self
    }

    /// Sets the `service.name` attribute.
    pub fn with_service_name(self, name: impl Into<Value>) -> Self {
        self.with_attribute(KeyValue {
            key: Key::from_static_str(SERVICE_NAME),
            value: name.into(),
        })
    }

    /// Sets the schema URL.
    pub fn with_schema_url(mut self, schema_url: impl Into<Cow<'static, str>>) -> Self {
        self.schema_url = Some(schema_url.into());
        self
    }

    /// Creates the [`Resource`].
    pub fn build(self) -> Resource {
        Resource {
            inner: Arc::new(ResourceInner {
                attrs: self.attrs,
                schema_url: self.schema_url,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resource_has_sdk_attributes() {
        let resource = Resource::default();
        assert_eq!(
            resource.get(&Key::from_static_str(SERVICE_NAME)),
            Some(&Value::from("unknown_service"))
        );
        assert!(resource.get(&Key::from_static_str(TELEMETRY_SDK_NAME)).is_some());
    }

    #[test]
    fn structural_equality() {
        let a = Resource::builder_empty()
            .with_attributes([KeyValue::new("k", "v")])
            .with_schema_url("https://example.com/schema")
            .build();
        let b = Resource::builder_empty()
            .with_attributes([KeyValue::new("k", "v")])
            .with_schema_url("https://example.com/schema")
            .build();
        assert_eq!(a, b);

        let c = Resource::builder_empty().build();
        assert_ne!(a, c);
    }

    #[test]
    fn builder_replaces_duplicate_keys() {
        let resource = Resource::builder_empty()
            .with_attribute(KeyValue::new("k", "old"))
            .with_attribute(KeyValue::new("k", "new"))
            .build();
        assert_eq!(resource.get(&Key::new("k")), Some(&Value::from("new")));
        assert_eq!(resource.len(), 1);
    }
}
