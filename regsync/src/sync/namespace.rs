use dashmap::DashMap;
use tracing::{debug, info};

use regsync_config::shared::NamespaceRule;

use crate::error::RegsyncResult;
use crate::registry::client::RegistryApi;
use crate::types::namespace_segment;

/// Namespace images from outside the internal registry are routed to.
pub const PUBLIC_NAMESPACE: &str = "public";

/// Ordered namespace mapping table.
///
/// The first rule whose substring matches the candidate namespace wins;
/// unmatched candidates pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRules {
    rules: Vec<NamespaceRule>,
}

impl NamespaceRules {
    pub fn new(rules: Vec<NamespaceRule>) -> Self {
        Self { rules }
    }

    /// Resolves a candidate namespace through the rule table.
    pub fn resolve(&self, candidate: &str) -> String {
        for rule in &self.rules {
            if candidate.contains(rule.matches.as_str()) {
                return rule.target.clone();
            }
        }

        candidate.to_owned()
    }
}

/// Chooses the target registry namespace for an image.
///
/// Images whose host does not start with the internal registry prefix go to
/// [`PUBLIC_NAMESPACE`]; otherwise the image's own namespace segment is the
/// candidate routed through the mapping table.
pub fn choose_namespace(image: &str, internal_prefix: &str, rules: &NamespaceRules) -> String {
    if !image.starts_with(internal_prefix) {
        return PUBLIC_NAMESPACE.to_owned();
    }

    match namespace_segment(image) {
        Some(candidate) => rules.resolve(candidate),
        None => PUBLIC_NAMESPACE.to_owned(),
    }
}

/// Write-once cache of namespaces confirmed to exist in the registry.
///
/// Entries are only ever added; namespaces are not deleted mid-run, so the
/// cache is never invalidated. The sharded map keeps concurrent inserts of
/// unrelated namespaces from serializing on one lock.
#[derive(Debug, Default)]
pub struct NamespaceCache {
    confirmed: DashMap<String, ()>,
}

impl NamespaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the namespace has been confirmed present.
    pub fn contains(&self, namespace: &str) -> bool {
        self.confirmed.contains_key(namespace)
    }

    /// Marks the namespace as confirmed present.
    pub fn confirm(&self, namespace: &str) {
        self.confirmed.insert(namespace.to_owned(), ());
    }
}

/// Ensures the namespace exists in the registry, creating it if necessary.
///
/// A cache hit short-circuits all remote calls. Created namespaces get
/// repository auto-creation and private default visibility.
pub async fn ensure_namespace<R: RegistryApi>(
    client: &R,
    cache: &NamespaceCache,
    namespace: &str,
) -> RegsyncResult<()> {
    if cache.contains(namespace) {
        debug!(namespace, "namespace already confirmed in cache");
        return Ok(());
    }

    if client.get_namespace(namespace).await? {
        cache.confirm(namespace);
        debug!(namespace, "namespace already exists");
        return Ok(());
    }

    client.create_namespace(namespace).await?;
    cache.confirm(namespace);
    info!(namespace, "namespace created");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::registry::FakeRegistry;

    fn rules() -> NamespaceRules {
        NamespaceRules::new(vec![
            NamespaceRule {
                matches: "idc-h3-core".to_owned(),
                target: "idc".to_owned(),
            },
            NamespaceRule {
                matches: "basic".to_owned(),
                target: "basic".to_owned(),
            },
        ])
    }

    #[test]
    fn test_internal_image_routed_through_rules() {
        let namespace = choose_namespace("harbor.internal/idc-h3-core/app:v1", "harbor.internal", &rules());
        assert_eq!(namespace, "idc");
    }

    #[test]
    fn test_external_image_goes_to_public() {
        let namespace = choose_namespace("other.host/foo/app:v1", "harbor.internal", &rules());
        assert_eq!(namespace, "public");
    }

    #[test]
    fn test_unmatched_namespace_passes_through() {
        let namespace = choose_namespace("harbor.internal/unknown-ns/app:v1", "harbor.internal", &rules());
        assert_eq!(namespace, "unknown-ns");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rules = NamespaceRules::new(vec![
            NamespaceRule {
                matches: "app".to_owned(),
                target: "first".to_owned(),
            },
            NamespaceRule {
                matches: "app".to_owned(),
                target: "second".to_owned(),
            },
        ]);

        assert_eq!(rules.resolve("app-ns"), "first");
    }

    #[tokio::test]
    async fn test_ensure_namespace_creates_missing_namespace() {
        let registry = FakeRegistry::default();
        let cache = NamespaceCache::new();

        ensure_namespace(&registry, &cache, "idc").await.unwrap();

        assert!(registry.namespace_exists("idc"));
        assert!(cache.contains("idc"));
        assert_eq!(registry.create_namespace_calls(), 1);
    }

    #[tokio::test]
    async fn test_ensure_namespace_cache_hit_short_circuits_remote_calls() {
        let registry = FakeRegistry::default();
        registry.add_namespace("idc");
        let cache = NamespaceCache::new();

        ensure_namespace(&registry, &cache, "idc").await.unwrap();
        ensure_namespace(&registry, &cache, "idc").await.unwrap();

        // The second call must not hit the registry at all.
        assert_eq!(registry.get_namespace_calls(), 1);
        assert_eq!(registry.create_namespace_calls(), 0);
    }
}
