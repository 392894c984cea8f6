use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Sync concurrency cannot be zero.
    #[error("`sync.concurrency` cannot be zero")]
    SyncConcurrencyZero,
    /// Update concurrency cannot be zero.
    #[error("`update.concurrency` cannot be zero")]
    UpdateConcurrencyZero,
    /// The registry instance id is required for every registry API call.
    #[error("`registry.instance_id` cannot be empty")]
    MissingInstanceId,
    /// The registry address is the host under which mirrored images are pushed.
    #[error("`registry.registry_addr` cannot be empty")]
    MissingRegistryAddr,
    /// At least one namespace must be selected for workload updates.
    #[error("`cluster.namespaces` cannot be empty")]
    NoNamespaces,
}
