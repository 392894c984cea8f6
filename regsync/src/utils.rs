//! Small generic collection helpers shared across the pipeline.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Removes duplicates from a slice, preserving first-occurrence order.
pub fn dedup_preserving_order<T>(items: &[T]) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::with_capacity(items.len());
    let mut result = Vec::with_capacity(items.len());

    for item in items {
        if seen.insert(item) {
            result.push(item.clone());
        }
    }

    result
}

/// Converts a slice into a map using key and value extraction closures.
///
/// Later items overwrite earlier ones when keys collide.
pub fn slice_to_map<T, K, V>(
    items: &[T],
    key: impl Fn(&T) -> K,
    value: impl Fn(&T) -> V,
) -> HashMap<K, V>
where
    K: Eq + Hash,
{
    let mut result = HashMap::with_capacity(items.len());
    for item in items {
        result.insert(key(item), value(item));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_preserves_first_occurrence_order() {
        let items = ["b", "a", "b", "c", "a"].map(str::to_owned);
        assert_eq!(dedup_preserving_order(&items), ["b", "a", "c"]);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let items = ["b", "a", "b", "c"].map(str::to_owned);
        let once = dedup_preserving_order(&items);
        let twice = dedup_preserving_order(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_slice_to_map_last_writer_wins() {
        let items = ["reg-a/ns/app:v1", "reg-b/ns/app:v1"].map(str::to_owned);
        let map = slice_to_map(
            &items,
            |image| crate::types::short_name_of(image).to_owned(),
            |image| image.clone(),
        );

        assert_eq!(map.len(), 1);
        assert_eq!(map["app:v1"], "reg-b/ns/app:v1");
    }
}
