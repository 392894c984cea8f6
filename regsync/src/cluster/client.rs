use std::future::Future;

use crate::error::RegsyncResult;

/// Container image references of one pod.
///
/// Only the image strings are carried; nothing else about the pod matters
/// for inventory purposes.
#[derive(Debug, Clone, Default)]
pub struct PodImages {
    /// Images of the pod's regular containers.
    pub containers: Vec<String>,
    /// Images of the pod's init containers.
    pub init_containers: Vec<String>,
}

/// Read access to the cluster's pod population.
pub trait ClusterApi {
    /// Lists the container and init-container images of every pod in every
    /// namespace, in one call.
    fn list_all_pods(&self) -> impl Future<Output = RegsyncResult<Vec<PodImages>>> + Send;
}
