use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Default number of concurrent (namespace, kind) update units.
fn default_concurrency() -> usize {
    4
}

/// Configuration for the workload update phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Maximum number of (namespace, resource kind) pairs updated
    /// concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Pause after each successful resource update, in seconds, bounding
    /// the mutation rate against the cluster API.
    pub pacing_secs: u64,
    /// Images whose `repository:tag` suffix contains any of these
    /// substrings are never rewritten.
    #[serde(default)]
    pub excluded_images: Vec<String>,
}

impl UpdateConfig {
    /// Validates the update configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 {
            return Err(ValidationError::UpdateConcurrencyZero);
        }

        Ok(())
    }
}
