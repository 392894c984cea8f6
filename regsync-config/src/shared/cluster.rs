use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration for cluster access and scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Namespaces whose workloads are repointed to the mirrored registry.
    ///
    /// Pod inventory is always cluster-wide; this list only scopes the
    /// workload update phase.
    pub namespaces: Vec<String>,
}

impl ClusterConfig {
    /// Validates the cluster configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.namespaces.is_empty() {
            return Err(ValidationError::NoNamespaces);
        }

        Ok(())
    }
}
