//! Per-field inverted index: value -> document keys.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::record::Field;

/// Inverted index over every field.
///
/// A document key appears in exactly one bucket per field it has a value
/// for. Buckets (and fields) that become empty are removed.
#[derive(Debug, Default, Clone)]
pub(crate) struct FieldIndex {
    by_field: HashMap<Field, BTreeMap<String, BTreeSet<String>>>,
}

impl FieldIndex {
    /// Move `key` from the `previous` bucket (if any) to the `value` bucket.
    pub(crate) fn update(&mut self, field: &Field, previous: Option<&str>, value: &str, key: &str) {
        if let Some(prev) = previous {
            if prev == value {
                return;
            }
            self.remove(field, prev, key);
        }
        self.by_field
            .entry(field.clone())
            .or_default()
            .entry(value.to_string())
            .or_default()
            .insert(key.to_string());
    }

    pub(crate) fn remove(&mut self, field: &Field, value: &str, key: &str) {
        let Some(buckets) = self.by_field.get_mut(field) else {
            return;
        };
        if let Some(set) = buckets.get_mut(value) {
            set.remove(key);
            if set.is_empty() {
                buckets.remove(value);
            }
        }
        if buckets.is_empty() {
            self.by_field.remove(field);
        }
    }

    /// Keys stored under exactly `value`.
    pub(crate) fn lookup(&self, field: &Field, value: &str) -> BTreeSet<String> {
        self.by_field
            .get(field)
            .and_then(|buckets| buckets.get(value))
            .cloned()
            .unwrap_or_default()
    }

    /// Union of every bucket whose value satisfies `matches`.
    pub(crate) fn scan(&self, field: &Field, matches: impl Fn(&str) -> bool) -> BTreeSet<String> {
        let Some(buckets) = self.by_field.get(field) else {
            return BTreeSet::new();
        };
        buckets
            .iter()
            .filter(|(value, _)| matches(value))
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Values whose bucket holds `key`.
    pub(crate) fn memberships(&self, field: &Field, key: &str) -> Vec<String> {
        self.by_field
            .get(field)
            .map(|buckets| {
                buckets
                    .iter()
                    .filter(|(_, keys)| keys.contains(key))
                    .map(|(value, _)| value.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Bucket count per field name.
    pub(crate) fn bucket_counts(&self) -> BTreeMap<String, usize> {
        self.by_field
            .iter()
            .map(|(field, buckets)| (field.name().to_string(), buckets.len()))
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.by_field.clear();
    }
}
