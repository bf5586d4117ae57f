//! Partitioning of record collections by an access key.

use crate::model::Record;
use std::collections::{BTreeMap, HashSet};

/// Keys that never form a group. `"undefined"` and `"null"` are how absent
/// values show up in some exports of the source data.
const EXCLUDED_KEYS: &[&str] = &["", "undefined", "null"];

/// A text key worth grouping on, or `None` if the record belongs to no group.
pub fn group_key(raw: Option<&str>) -> Option<&str> {
    raw.filter(|key| !EXCLUDED_KEYS.contains(key))
}

/// Partition `records` by `key`, skipping records whose key is `None`.
///
/// Groups come back in ascending key order and every group is sorted by
/// name, so two runs over the same input emit identical documents.
pub fn group_by<'a, T, K, F>(records: &'a [T], key: F) -> BTreeMap<K, Vec<&'a T>>
where
    T: Record,
    K: Ord,
    F: Fn(&'a T) -> Option<K>,
{
    let mut groups: BTreeMap<K, Vec<&'a T>> = BTreeMap::new();
    for record in records {
        if let Some(k) = key(record) {
            groups.entry(k).or_default().push(record);
        }
    }
    for members in groups.values_mut() {
        sort_by_name(members);
    }
    groups
}

/// Stable sort by name in code-point order.
pub fn sort_by_name<T: Record>(records: &mut [&T]) {
    records.sort_by(|a, b| a.name().cmp(b.name()));
}

/// Distinct non-empty values in first-seen order.
pub fn distinct<'a, I>(values: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .flatten()
        .filter(|value| !value.is_empty() && seen.insert(*value))
        .collect()
}

/// Distinct non-empty values, sorted.
pub fn distinct_sorted<'a, I>(values: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut values = distinct(values);
    values.sort_unstable();
    values
}
