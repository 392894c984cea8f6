use std::fmt;

/// Tag assumed when an image reference carries none.
const DEFAULT_TAG: &str = "latest";

/// A fully-qualified container image reference.
///
/// Serialized as `registry/namespace/repository:tag`. The `repository:tag`
/// suffix is the [short name](short_name_of), the join key used to match
/// images across the cluster and the registry regardless of host and
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: String,
    pub namespace: String,
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(registry: &str, namespace: &str, repository: &str, tag: &str) -> Self {
        Self {
            registry: registry.to_owned(),
            namespace: namespace.to_owned(),
            repository: repository.to_owned(),
            tag: tag.to_owned(),
        }
    }

    /// Parses a fully-qualified reference of the form
    /// `registry/namespace/repository[:tag]`.
    ///
    /// Returns [`None`] for references with fewer than three path segments;
    /// those cannot carry a namespace and are handled through
    /// [`short_name_of`] instead.
    pub fn parse(image: &str) -> Option<Self> {
        let parts: Vec<&str> = image.split('/').collect();
        if parts.len() < 3 {
            return None;
        }

        let (repository, tag) = match parts[parts.len() - 1].split_once(':') {
            Some((repository, tag)) => (repository, tag),
            None => (parts[parts.len() - 1], DEFAULT_TAG),
        };

        Some(Self {
            registry: parts[0].to_owned(),
            namespace: parts[1..parts.len() - 1].join("/"),
            repository: repository.to_owned(),
            tag: tag.to_owned(),
        })
    }

    /// The `repository:tag` suffix of this reference.
    pub fn short_name(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}:{}",
            self.registry, self.namespace, self.repository, self.tag
        )
    }
}

/// Returns the short name of an arbitrary image string: its last `/` segment,
/// or the whole string when it has no path separator.
///
/// Cluster images are not always fully qualified (`nginx:1.25`,
/// `library/nginx`), so this works on the raw string rather than requiring a
/// parsed [`ImageRef`].
pub fn short_name_of(image: &str) -> &str {
    image.rsplit('/').next().unwrap_or(image)
}

/// Returns the namespace segment (the second path segment) of an image
/// reference, if it has one.
pub fn namespace_segment(image: &str) -> Option<&str> {
    let mut parts = image.split('/');
    parts.next()?;
    parts.next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_reference() {
        let image = ImageRef::parse("harbor.internal/idc-h3-core/app:v1").unwrap();
        assert_eq!(image.registry, "harbor.internal");
        assert_eq!(image.namespace, "idc-h3-core");
        assert_eq!(image.repository, "app");
        assert_eq!(image.tag, "v1");
        assert_eq!(image.short_name(), "app:v1");
        assert_eq!(image.to_string(), "harbor.internal/idc-h3-core/app:v1");
    }

    #[test]
    fn test_parse_defaults_missing_tag() {
        let image = ImageRef::parse("harbor.internal/basic/redis").unwrap();
        assert_eq!(image.tag, "latest");
        assert_eq!(image.short_name(), "redis:latest");
    }

    #[test]
    fn test_parse_rejects_short_references() {
        assert!(ImageRef::parse("nginx:1.25").is_none());
        assert!(ImageRef::parse("library/nginx").is_none());
    }

    #[test]
    fn test_short_name_of() {
        assert_eq!(short_name_of("harbor.internal/ns/app:v1"), "app:v1");
        assert_eq!(short_name_of("library/nginx"), "nginx");
        assert_eq!(short_name_of("nginx:1.25"), "nginx:1.25");
    }

    #[test]
    fn test_namespace_segment() {
        assert_eq!(
            namespace_segment("harbor.internal/idc-h3-core/app:v1"),
            Some("idc-h3-core")
        );
        assert_eq!(namespace_segment("nginx:1.25"), None);
    }
}
