//! Pure set-difference between cluster and registry inventories.

use crate::types::{InventorySnapshot, short_name_of};

/// Computes the full references of cluster images missing from the registry.
///
/// An image is missing when its short name is absent from the registry
/// snapshot; the returned references are the cluster-side full references,
/// sorted lexicographically so downstream behavior is deterministic.
pub fn missing_images(cluster: &InventorySnapshot, registry: &InventorySnapshot) -> Vec<String> {
    let mut missing: Vec<String> = cluster
        .short_names()
        .into_iter()
        .filter(|short_name| !registry.contains_short_name(short_name))
        .filter_map(|short_name| cluster.resolve(&short_name).map(str::to_owned))
        .collect();

    missing.sort();
    missing.dedup();

    missing
}

/// Drops every reference whose short name contains any exclusion substring.
pub fn remove_excluded(images: Vec<String>, exclusions: &[String]) -> Vec<String> {
    images
        .into_iter()
        .filter(|image| !is_excluded(short_name_of(image), exclusions))
        .collect()
}

/// Returns whether a short name matches any exclusion substring.
pub fn is_excluded(short_name: &str, exclusions: &[String]) -> bool {
    exclusions
        .iter()
        .any(|substring| short_name.contains(substring.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(images: &[&str]) -> InventorySnapshot {
        InventorySnapshot::from_images(images.iter().map(|s| (*s).to_owned()).collect())
    }

    #[test]
    fn test_missing_images_by_short_name() {
        let cluster = snapshot(&["harbor.internal/ns/a:1", "harbor.internal/ns/b:1"]);
        let registry = snapshot(&["reg/mirror/a:1"]);

        assert_eq!(
            missing_images(&cluster, &registry),
            ["harbor.internal/ns/b:1"]
        );
    }

    #[test]
    fn test_missing_images_empty_when_registry_covers_cluster() {
        let cluster = snapshot(&["harbor.internal/ns/a:1"]);
        let registry = snapshot(&["reg/mirror/a:1"]);

        assert!(missing_images(&cluster, &registry).is_empty());
    }

    #[test]
    fn test_missing_images_sorted() {
        let cluster = snapshot(&["reg/ns/z:1", "reg/ns/a:1", "reg/ns/m:1"]);
        let registry = snapshot(&[]);

        assert_eq!(
            missing_images(&cluster, &registry),
            ["reg/ns/a:1", "reg/ns/m:1", "reg/ns/z:1"]
        );
    }

    #[test]
    fn test_exclusion_drops_matching_short_names() {
        let cluster = snapshot(&["reg/ns/a:1", "reg/ns/b:1"]);
        let registry = snapshot(&["other/mirror/a:1"]);

        let missing = missing_images(&cluster, &registry);
        assert_eq!(missing, ["reg/ns/b:1"]);

        let filtered = remove_excluded(missing, &["b".to_owned()]);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_exclusion_matches_short_name_only() {
        // The registry host appears only in the full reference, never in the
        // short name, so it is not an exclusion match target.
        let filtered = remove_excluded(
            vec!["harbor.internal/ns/app:v1".to_owned()],
            &["harbor.internal".to_owned()],
        );
        assert_eq!(filtered, ["harbor.internal/ns/app:v1"]);
    }

    #[test]
    fn test_unqualified_cluster_references() {
        let cluster = snapshot(&["a:1", "b:1"]);
        let registry = snapshot(&["a:1"]);

        let missing = missing_images(&cluster, &registry);
        assert_eq!(missing, ["b:1"]);
        assert!(remove_excluded(missing, &["b".to_owned()]).is_empty());
    }

    #[test]
    fn test_empty_exclusions_keep_everything() {
        let filtered = remove_excluded(vec!["reg/ns/a:1".to_owned()], &[]);
        assert_eq!(filtered, ["reg/ns/a:1"]);
    }
}
