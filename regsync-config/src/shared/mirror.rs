use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{
    ClusterConfig, RegistryConfig, RetryConfig, SyncConfig, UpdateConfig, ValidationError,
};

/// Complete configuration for the mirror service.
///
/// Aggregates registry access, cluster scope, sync and update behavior.
/// Typically loaded from configuration files at startup, with credentials
/// supplied through environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MirrorConfig {
    /// Configuration for the managed registry.
    pub registry: RegistryConfig,
    /// Configuration for cluster access and scope.
    pub cluster: ClusterConfig,
    /// Configuration for inventories and image sync.
    pub sync: SyncConfig,
    /// Configuration for the workload update phase.
    pub update: UpdateConfig,
    /// Retry policy for throttled registry API calls.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl MirrorConfig {
    /// Validates the complete mirror configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.registry.validate()?;
        self.cluster.validate()?;
        self.sync.validate()?;
        self.update.validate()?;

        Ok(())
    }
}

impl Config for MirrorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[
        "cluster.namespaces",
        "sync.excluded_domains",
        "update.excluded_images",
    ];
}
