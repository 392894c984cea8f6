use std::fmt::Debug;

use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, PostParams};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cluster::client::{ClusterApi, PodImages};
use crate::cluster::workload::WorkloadStore;
use crate::error::RegsyncResult;

/// Cluster client backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: kube::Client,
}

impl KubeClusterClient {
    /// Connects using the default kubeconfig or in-cluster environment.
    pub async fn connect() -> RegsyncResult<Self> {
        let client = kube::Client::try_default().await?;

        Ok(Self { client })
    }
}

impl ClusterApi for KubeClusterClient {
    async fn list_all_pods(&self) -> RegsyncResult<Vec<PodImages>> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let list = pods.list(&ListParams::default()).await?;

        Ok(list
            .items
            .into_iter()
            .map(|pod| {
                let spec = pod.spec.unwrap_or_default();
                PodImages {
                    containers: spec
                        .containers
                        .into_iter()
                        .filter_map(|container| container.image)
                        .collect(),
                    init_containers: spec
                        .init_containers
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|container| container.image)
                        .collect(),
                }
            })
            .collect())
    }
}

impl<K> WorkloadStore<K> for KubeClusterClient
where
    K: kube::Resource<Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync,
    K::DynamicType: Default,
{
    async fn list(&self, namespace: &str) -> RegsyncResult<Vec<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;

        Ok(list.items)
    }

    async fn get(&self, namespace: &str, name: &str) -> RegsyncResult<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);

        Ok(api.get(name).await?)
    }

    async fn update(&self, namespace: &str, name: &str, resource: &K) -> RegsyncResult<()> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.replace(name, &PostParams::default(), resource).await?;

        Ok(())
    }
}
