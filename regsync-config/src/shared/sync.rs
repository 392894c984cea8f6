use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Default number of concurrent image sync tasks and inventory workers.
fn default_concurrency() -> usize {
    10
}

/// Default hard deadline for one inventory pass, in seconds.
fn default_timeout_secs() -> u64 {
    120
}

/// One ordered namespace mapping rule.
///
/// An image whose namespace segment contains `matches` is routed to the
/// `target` registry namespace. Rules are evaluated in order; the first
/// match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceRule {
    /// Substring matched against the image's namespace segment.
    pub matches: String,
    /// Target registry namespace.
    pub target: String,
}

impl NamespaceRule {
    fn new(matches: &str, target: &str) -> Self {
        Self {
            matches: matches.to_owned(),
            target: target.to_owned(),
        }
    }
}

/// Default namespace mapping table.
fn default_namespace_rules() -> Vec<NamespaceRule> {
    vec![
        NamespaceRule::new("idc-h3-core", "idc"),
        NamespaceRule::new("idc-h3-frontend", "idc"),
        NamespaceRule::new("idc-h3-expansion", "idc"),
        NamespaceRule::new("idc-h3-infra", "idc"),
        NamespaceRule::new("idc-h3-public", "idc"),
        NamespaceRule::new("idc-h3-scale", "idc"),
        NamespaceRule::new("idc-h3-shennong", "idc"),
        NamespaceRule::new("idc-h3yun", "idc"),
        NamespaceRule::new("idc-platform-assisted", "idc"),
        NamespaceRule::new("idc-h3yun-deploy", "h3sre"),
        NamespaceRule::new("idc-sre-scrapers", "monitor"),
        NamespaceRule::new("monitoring", "monitor"),
        NamespaceRule::new("prometheus-operator", "monitor"),
        NamespaceRule::new("basic", "basic"),
        NamespaceRule::new("base", "basic"),
        NamespaceRule::new("elastic-operator", "basic"),
    ]
}

/// Configuration for the inventory and image sync phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum number of concurrent per-repository listing workers and
    /// per-image sync tasks.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Hard deadline for one inventory pass, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Host prefix identifying images that originate from the internal
    /// registry. Images from any other host are routed to the `public`
    /// namespace.
    pub internal_registry_prefix: String,
    /// Images whose `repository:tag` suffix contains any of these
    /// substrings are never synced.
    #[serde(default)]
    pub excluded_domains: Vec<String>,
    /// Ordered namespace mapping rules; first match wins, unmatched
    /// namespace segments pass through unchanged.
    #[serde(default = "default_namespace_rules")]
    pub namespace_rules: Vec<NamespaceRule>,
}

impl SyncConfig {
    /// Validates the sync configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 {
            return Err(ValidationError::SyncConcurrencyZero);
        }

        Ok(())
    }
}
