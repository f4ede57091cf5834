//! Bounded, insertion-ordered attribute storage.

use crate::common::{AnyValue, Key};

/// A bounded map from attribute keys to values.
///
/// Insertion order is preserved for iteration. Once the map holds `capacity`
/// distinct keys, further *new* keys are dropped while updates to existing
/// keys still apply; every put attempt is counted so the number of dropped
/// entries can be reported. String values longer than the configured limit
/// are truncated, including strings nested inside list values.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributesMap {
    entries: Vec<(Key, AnyValue)>,
    capacity: usize,
    max_value_len: Option<usize>,
    total_added: u32,
}

impl AttributesMap {
    pub(crate) fn new(capacity: usize, max_value_len: Option<usize>) -> Self {
        AttributesMap {
            entries: Vec::new(),
            capacity,
            max_value_len,
            total_added: 0,
        }
    }

    /// Records a put attempt. Empty keys are rejected by callers, not here.
    pub(crate) fn put(&mut self, key: Key, value: AnyValue) {
        self.total_added = self.total_added.saturating_add(1);
        let value = match self.max_value_len {
            Some(limit) => truncate_value(value, limit),
            None => value,
        };
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else if self.entries.len() < self.capacity {
            self.entries.push((key, value));
        }
        // At capacity and the key is new: the attempt is counted but the
        // entry is dropped. Existing entries are never evicted.
    }

    /// Number of stored entries, at most the configured capacity.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every put attempt, including the dropped ones.
    pub fn total_added(&self) -> u32 {
        self.total_added
    }

    /// Attempts that did not result in a stored entry.
    pub fn dropped_count(&self) -> u32 {
        self.total_added.saturating_sub(self.entries.len() as u32)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &AnyValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &Key) -> Option<&AnyValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

fn truncate_value(value: AnyValue, limit: usize) -> AnyValue {
    match value {
        AnyValue::String(s) if s.as_str().chars().count() > limit => {
            AnyValue::String(s.as_str().chars().take(limit).collect::<String>().into())
        }
        AnyValue::ListAny(values) => AnyValue::ListAny(Box::new(
            values.into_iter().map(|v| truncate_value(v, limit)).collect(),
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_enforced_and_attempts_counted() {
        let mut map = AttributesMap::new(2, None);
        for i in 0..5 {
            map.put(format!("key{i}").into(), AnyValue::Int(i));
        }
        assert_eq!(map.len(), 2);
        assert_eq!(map.total_added(), 5);
        assert_eq!(map.dropped_count(), 3);
        assert_eq!(map.get(&Key::new("key0")), Some(&AnyValue::Int(0)));
        assert_eq!(map.get(&Key::new("key4")), None);
    }

    #[test]
    fn existing_keys_update_at_capacity() {
        let mut map = AttributesMap::new(1, None);
        map.put("a".into(), AnyValue::Int(1));
        map.put("a".into(), AnyValue::Int(2));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&Key::new("a")), Some(&AnyValue::Int(2)));
        assert_eq!(map.total_added(), 2);
        // total keeps counting replacement attempts, dropped stays derived
        assert_eq!(map.dropped_count(), 1);
    }

    #[test]
    fn long_strings_are_truncated() {
        let mut map = AttributesMap::new(4, Some(3));
        map.put("s".into(), AnyValue::String("abcdef".into()));
        assert_eq!(
            map.get(&Key::new("s")),
            Some(&AnyValue::String("abc".into()))
        );

        map.put(
            "list".into(),
            AnyValue::ListAny(Box::new(vec![AnyValue::String("xxxxx".into())])),
        );
        assert_eq!(
            map.get(&Key::new("list")),
            Some(&AnyValue::ListAny(Box::new(vec![AnyValue::String(
                "xxx".into()
            )])))
        );
    }

    #[test]
    fn insertion_order_preserved() {
        let mut map = AttributesMap::new(10, None);
        map.put("b".into(), AnyValue::Int(1));
        map.put("a".into(), AnyValue::Int(2));
        map.put("c".into(), AnyValue::Int(3));
        let keys: Vec<&str> = map.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }
}
