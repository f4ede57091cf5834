//! Marshalers for the `opentelemetry.proto.common.v1` and `resource.v1`
//! messages, and the resource/scope grouping shared by both signals.

use std::collections::HashMap;

use otelkit::{AnyValue, Array, InstrumentationScope, Key, Resource, StringValue, Value};

use super::serializer::{self, ProtoSerializer};
use super::wire::{self, field, ProtoField, WIRETYPE_FIXED64, WIRETYPE_LENGTH_DELIMITED, WIRETYPE_VARINT};
use super::{MarshalContext, Marshaler};

pub(crate) mod fields {
    use super::*;

    // common.v1.AnyValue, a oneof over these
    pub(crate) const ANY_VALUE_STRING: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
    pub(crate) const ANY_VALUE_BOOL: ProtoField = field(2, WIRETYPE_VARINT);
    pub(crate) const ANY_VALUE_INT: ProtoField = field(3, WIRETYPE_VARINT);
    pub(crate) const ANY_VALUE_DOUBLE: ProtoField = field(4, WIRETYPE_FIXED64);
    pub(crate) const ANY_VALUE_ARRAY: ProtoField = field(5, WIRETYPE_LENGTH_DELIMITED);
    pub(crate) const ANY_VALUE_KVLIST: ProtoField = field(6, WIRETYPE_LENGTH_DELIMITED);
    pub(crate) const ANY_VALUE_BYTES: ProtoField = field(7, WIRETYPE_LENGTH_DELIMITED);

    // common.v1.ArrayValue / KeyValueList
    pub(crate) const ARRAY_VALUE_VALUES: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
    pub(crate) const KEY_VALUE_LIST_VALUES: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);

    // common.v1.KeyValue
    pub(crate) const KEY_VALUE_KEY: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
    pub(crate) const KEY_VALUE_VALUE: ProtoField = field(2, WIRETYPE_LENGTH_DELIMITED);

    // common.v1.InstrumentationScope
    pub(crate) const SCOPE_NAME: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
    pub(crate) const SCOPE_VERSION: ProtoField = field(2, WIRETYPE_LENGTH_DELIMITED);
    pub(crate) const SCOPE_ATTRIBUTES: ProtoField = field(3, WIRETYPE_LENGTH_DELIMITED);

    // resource.v1.Resource
    pub(crate) const RESOURCE_ATTRIBUTES: ProtoField = field(1, WIRETYPE_LENGTH_DELIMITED);
}

/// A borrowed view over either an [`AnyValue`] or a [`Value`], so span
/// attributes (restricted to `Value`) and log attributes/bodies share one
/// wire encoder.
#[derive(Clone, Copy)]
pub(crate) enum AnyValueRef<'a> {
    Str(&'a str),
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(&'a [u8]),
    List(ListRef<'a>),
    Map(&'a HashMap<Key, AnyValue>),
}

#[derive(Clone, Copy)]
pub(crate) enum ListRef<'a> {
    Any(&'a [AnyValue]),
    Bool(&'a [bool]),
    I64(&'a [i64]),
    F64(&'a [f64]),
    Str(&'a [StringValue]),
}

impl<'a> From<&'a AnyValue> for AnyValueRef<'a> {
    fn from(value: &'a AnyValue) -> Self {
        match value {
            AnyValue::String(s) => AnyValueRef::Str(s.as_str()),
            AnyValue::Boolean(b) => AnyValueRef::Bool(*b),
            AnyValue::Int(i) => AnyValueRef::Int(*i),
            AnyValue::Double(d) => AnyValueRef::Double(*d),
            AnyValue::Bytes(b) => AnyValueRef::Bytes(b),
            AnyValue::ListAny(values) => AnyValueRef::List(ListRef::Any(values)),
            AnyValue::Map(map) => AnyValueRef::Map(map),
            _ => AnyValueRef::Str(""),
        }
    }
}

impl<'a> From<&'a Value> for AnyValueRef<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(s) => AnyValueRef::Str(s.as_str()),
            Value::Bool(b) => AnyValueRef::Bool(*b),
            Value::I64(i) => AnyValueRef::Int(*i),
            Value::F64(d) => AnyValueRef::Double(*d),
            Value::Array(Array::Bool(values)) => AnyValueRef::List(ListRef::Bool(values)),
            Value::Array(Array::I64(values)) => AnyValueRef::List(ListRef::I64(values)),
            Value::Array(Array::F64(values)) => AnyValueRef::List(ListRef::F64(values)),
            Value::Array(Array::String(values)) => AnyValueRef::List(ListRef::Str(values)),
            _ => AnyValueRef::Str(""),
        }
    }
}

impl ListRef<'_> {
    fn for_each(&self, mut f: impl FnMut(AnyValueRef<'_>)) {
        match self {
            ListRef::Any(values) => values.iter().for_each(|v| f(v.into())),
            ListRef::Bool(values) => values.iter().for_each(|v| f(AnyValueRef::Bool(*v))),
            ListRef::I64(values) => values.iter().for_each(|v| f(AnyValueRef::Int(*v))),
            ListRef::F64(values) => values.iter().for_each(|v| f(AnyValueRef::Double(*v))),
            ListRef::Str(values) => values.iter().for_each(|v| f(AnyValueRef::Str(v.as_str()))),
        }
    }
}

impl Marshaler for AnyValueRef<'_> {
    // The value is a oneof, so the populated variant is written even when it
    // equals the proto default.
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        match self {
            AnyValueRef::Str(s) => {
                fields::ANY_VALUE_STRING.tag_size + wire::len_delimited_size(s.len())
            }
            AnyValueRef::Bool(_) => fields::ANY_VALUE_BOOL.tag_size + 1,
            AnyValueRef::Int(v) => {
                fields::ANY_VALUE_INT.tag_size + wire::int64_size(*v)
            }
            AnyValueRef::Double(_) => fields::ANY_VALUE_DOUBLE.tag_size + 8,
            AnyValueRef::Bytes(b) => {
                fields::ANY_VALUE_BYTES.tag_size + wire::len_delimited_size(b.len())
            }
            AnyValueRef::List(list) => {
                let index = ctx.reserve_size();
                let mut content = 0;
                list.for_each(|element| {
                    let element_index = ctx.reserve_size();
                    let element_size = element.size(ctx);
                    ctx.set_size(element_index, element_size);
                    content += fields::ARRAY_VALUE_VALUES.tag_size
                        + wire::len_delimited_size(element_size);
                });
                ctx.set_size(index, content);
                fields::ANY_VALUE_ARRAY.tag_size + wire::len_delimited_size(content)
            }
            AnyValueRef::Map(map) => {
                let index = ctx.reserve_size();
                let mut content = 0;
                for (key, value) in map.iter() {
                    let entry = KeyValueMarshaler {
                        key: key.as_str(),
                        value: value.into(),
                    };
                    content += super::size_message(&fields::KEY_VALUE_LIST_VALUES, &entry, ctx);
                }
                ctx.set_size(index, content);
                fields::ANY_VALUE_KVLIST.tag_size + wire::len_delimited_size(content)
            }
        }
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        match self {
            AnyValueRef::Str(s) => serializer.write_string(&fields::ANY_VALUE_STRING, s),
            AnyValueRef::Bool(b) => serializer.write_bool(&fields::ANY_VALUE_BOOL, *b),
            AnyValueRef::Int(v) => serializer.write_int64(&fields::ANY_VALUE_INT, *v),
            AnyValueRef::Double(d) => serializer.write_double(&fields::ANY_VALUE_DOUBLE, *d),
            AnyValueRef::Bytes(b) => serializer.write_bytes(&fields::ANY_VALUE_BYTES, b),
            AnyValueRef::List(list) => {
                let content = ctx.next_size();
                serializer.write_message_header(&fields::ANY_VALUE_ARRAY, content);
                list.for_each(|element| {
                    let element_size = ctx.next_size();
                    serializer.write_message_header(&fields::ARRAY_VALUE_VALUES, element_size);
                    element.write(serializer, ctx);
                });
            }
            AnyValueRef::Map(map) => {
                let content = ctx.next_size();
                serializer.write_message_header(&fields::ANY_VALUE_KVLIST, content);
                for (key, value) in map.iter() {
                    let entry = KeyValueMarshaler {
                        key: key.as_str(),
                        value: value.into(),
                    };
                    super::write_message(&fields::KEY_VALUE_LIST_VALUES, &entry, serializer, ctx);
                }
            }
        }
    }
}

/// `common.v1.KeyValue`.
pub(crate) struct KeyValueMarshaler<'a> {
    pub(crate) key: &'a str,
    pub(crate) value: AnyValueRef<'a>,
}

impl Marshaler for KeyValueMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        serializer::string_size(&fields::KEY_VALUE_KEY, self.key)
            + super::size_message(&fields::KEY_VALUE_VALUE, &self.value, ctx)
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        serializer.serialize_string(&fields::KEY_VALUE_KEY, self.key);
        super::write_message(&fields::KEY_VALUE_VALUE, &self.value, serializer, ctx);
    }
}

/// Sizes a `repeated KeyValue` field from any borrowed entry iterator.
///
/// The same iterator construction must be passed to
/// [`write_repeated_key_values`] so both passes traverse identically.
pub(crate) fn size_repeated_key_values<'a>(
    field: &ProtoField,
    entries: impl Iterator<Item = (&'a str, AnyValueRef<'a>)>,
    ctx: &mut MarshalContext,
) -> usize {
    let mut size = 0;
    for (key, value) in entries {
        let entry = KeyValueMarshaler { key, value };
        size += super::size_message(field, &entry, ctx);
    }
    size
}

/// Write-pass twin of [`size_repeated_key_values`].
pub(crate) fn write_repeated_key_values<'a>(
    field: &ProtoField,
    entries: impl Iterator<Item = (&'a str, AnyValueRef<'a>)>,
    serializer: &mut ProtoSerializer<'_, '_>,
    ctx: &mut MarshalContext,
) {
    for (key, value) in entries {
        let entry = KeyValueMarshaler { key, value };
        super::write_message(field, &entry, serializer, ctx);
    }
}

/// `common.v1.InstrumentationScope`.
pub(crate) struct ScopeMarshaler<'a>(pub(crate) &'a InstrumentationScope);

impl Marshaler for ScopeMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        serializer::string_size(&fields::SCOPE_NAME, self.0.name())
            + serializer::string_size(&fields::SCOPE_VERSION, self.0.version().unwrap_or(""))
            + size_repeated_key_values(
                &fields::SCOPE_ATTRIBUTES,
                self.0
                    .attributes()
                    .map(|kv| (kv.key.as_str(), AnyValueRef::from(&kv.value))),
                ctx,
            )
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        serializer.serialize_string(&fields::SCOPE_NAME, self.0.name());
        serializer.serialize_string(&fields::SCOPE_VERSION, self.0.version().unwrap_or(""));
        write_repeated_key_values(
            &fields::SCOPE_ATTRIBUTES,
            self.0
                .attributes()
                .map(|kv| (kv.key.as_str(), AnyValueRef::from(&kv.value))),
            serializer,
            ctx,
        );
    }
}

/// `resource.v1.Resource`.
pub(crate) struct ResourceMarshaler<'a>(pub(crate) &'a Resource);

impl Marshaler for ResourceMarshaler<'_> {
    fn size(&self, ctx: &mut MarshalContext) -> usize {
        // Iterating the same map instance twice yields the same order, which
        // the two-pass discipline relies on.
        size_repeated_key_values(
            &fields::RESOURCE_ATTRIBUTES,
            self.0.iter().map(|(k, v)| (k.as_str(), AnyValueRef::from(v))),
            ctx,
        )
    }

    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext) {
        write_repeated_key_values(
            &fields::RESOURCE_ATTRIBUTES,
            self.0.iter().map(|(k, v)| (k.as_str(), AnyValueRef::from(v))),
            serializer,
            ctx,
        );
    }
}

/// Groups records by resource identity, then by instrumentation scope,
/// preserving first-seen order at both levels.
pub(crate) fn group_by_resource_and_scope<'a, T>(
    items: &'a [T],
    resource_of: impl Fn(&'a T) -> &'a Resource,
    scope_of: impl Fn(&'a T) -> &'a InstrumentationScope,
) -> Vec<(&'a Resource, Vec<(&'a InstrumentationScope, Vec<&'a T>)>)> {
    let mut grouped: Vec<(&Resource, Vec<(&InstrumentationScope, Vec<&T>)>)> = Vec::new();
    let mut resource_index: HashMap<&Resource, usize> = HashMap::new();

    for item in items {
        let resource = resource_of(item);
        let scope = scope_of(item);
        let resource_slot = *resource_index.entry(resource).or_insert_with(|| {
            grouped.push((resource, Vec::new()));
            grouped.len() - 1
        });
        let scopes = &mut grouped[resource_slot].1;
        match scopes.iter_mut().find(|(s, _)| *s == scope) {
            Some((_, list)) => list.push(item),
            None => scopes.push((scope, vec![item])),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_preserves_first_seen_order() {
        let resource_a = Resource::builder_empty()
            .with_attributes([otelkit::KeyValue::new("res", "a")])
            .build();
        let resource_b = Resource::builder_empty()
            .with_attributes([otelkit::KeyValue::new("res", "b")])
            .build();
        let scope_1 = InstrumentationScope::builder("s1").build();
        let scope_2 = InstrumentationScope::builder("s2").build();

        struct Item(Resource, InstrumentationScope);
        let items = vec![
            Item(resource_a.clone(), scope_1.clone()),
            Item(resource_a.clone(), scope_2.clone()),
            Item(resource_b.clone(), scope_1.clone()),
        ];

        let groups = group_by_resource_and_scope(&items, |i| &i.0, |i| &i.1);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, &resource_a);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[0].0, &scope_1);
        assert_eq!(groups[0].1[0].1.len(), 1);
        assert_eq!(groups[0].1[1].0, &scope_2);
        assert_eq!(groups[1].0, &resource_b);
        assert_eq!(groups[1].1.len(), 1);
        assert_eq!(groups[1].1[0].1.len(), 1);
    }

    #[test]
    fn equal_resources_from_different_instances_group_together() {
        let make = || {
            Resource::builder_empty()
                .with_attributes([otelkit::KeyValue::new("res", "same")])
                .build()
        };
        let scope = InstrumentationScope::builder("s").build();
        struct Item(Resource, InstrumentationScope);
        let items = vec![Item(make(), scope.clone()), Item(make(), scope.clone())];
        let groups = group_by_resource_and_scope(&items, |i| &i.0, |i| &i.1);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].1[0].1.len(), 2);
    }
}
