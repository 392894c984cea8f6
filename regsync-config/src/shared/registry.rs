use serde::{Deserialize, Serialize};

use crate::SerializableSecretString;
use crate::shared::ValidationError;

/// Default sustained request rate against the registry API, per second.
fn default_requests_per_sec() -> u32 {
    5
}

/// Default burst allowance of the registry API rate limiter.
fn default_burst() -> u32 {
    100
}

/// Configuration for the managed registry instance.
///
/// Covers both the registry's management API (repository/tag listing,
/// namespace management, authorization tokens) and the address images are
/// pulled from and pushed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Region identifier of the registry instance.
    pub region_id: String,
    /// Instance identifier passed to every registry API call.
    pub instance_id: String,
    /// Host of the registry management API, e.g. `cr.cn-hangzhou.aliyuncs.com`.
    pub endpoint: String,
    /// Host under which mirrored images are addressed, e.g.
    /// `registry-vpc.cn-hangzhou.example.com`.
    pub registry_addr: String,
    /// Username used for the container runtime login.
    pub username: String,
    /// Access key id for API request signing.
    pub access_key_id: String,
    /// Access key secret for API request signing.
    pub access_key_secret: SerializableSecretString,
    /// Sustained registry API request rate, per second.
    #[serde(default = "default_requests_per_sec")]
    pub requests_per_sec: u32,
    /// Burst allowance on top of the sustained rate.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl RegistryConfig {
    /// Validates the registry configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.instance_id.is_empty() {
            return Err(ValidationError::MissingInstanceId);
        }
        if self.registry_addr.is_empty() {
            return Err(ValidationError::MissingRegistryAddr);
        }

        Ok(())
    }
}
