use std::collections::HashMap;

use crate::types::image::short_name_of;
use crate::utils::{dedup_preserving_order, slice_to_map};

/// Immutable result of listing all images from one source at a point in time.
///
/// Holds the deduplicated full references and a short-name lookup. Snapshots
/// are built by a single coordinator and never mutated afterwards; every
/// pipeline stage that needs fresher data builds a new one.
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    images: Vec<String>,
    by_short_name: HashMap<String, String>,
}

impl InventorySnapshot {
    /// Builds a snapshot from raw image references.
    ///
    /// Full references are deduplicated and sorted lexicographically, since
    /// discovery order across concurrent workers is non-deterministic. The
    /// short-name lookup is last-writer-wins when two distinct full
    /// references share a short name.
    pub fn from_images(images: Vec<String>) -> Self {
        let mut images = dedup_preserving_order(&images);
        images.sort();
        let by_short_name = slice_to_map(
            &images,
            |image| short_name_of(image).to_owned(),
            |image| image.clone(),
        );

        Self {
            images,
            by_short_name,
        }
    }

    /// Deduplicated full references, sorted lexicographically.
    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Short names of every image, in the same order as [`Self::images`].
    pub fn short_names(&self) -> Vec<String> {
        self.images
            .iter()
            .map(|image| short_name_of(image).to_owned())
            .collect()
    }

    /// Short name → full reference lookup.
    pub fn lookup(&self) -> &HashMap<String, String> {
        &self.by_short_name
    }

    /// Returns whether an image with this short name is present.
    pub fn contains_short_name(&self, short_name: &str) -> bool {
        self.by_short_name.contains_key(short_name)
    }

    /// Resolves a short name to its full reference.
    pub fn resolve(&self, short_name: &str) -> Option<&str> {
        self.by_short_name.get(short_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
