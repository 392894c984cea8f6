//! Real client implementations and their construction.
//!
//! Clients are built once at startup through an explicit factory and passed
//! into each pipeline component, keeping construction injectable for tests.

pub mod acr;
pub mod kube;

use std::future::Future;

use regsync_config::shared::RegistryConfig;
use tokio::sync::OnceCell;

use crate::clients::acr::AcrRegistryClient;
use crate::clients::kube::KubeClusterClient;
use crate::cluster::client::ClusterApi;
use crate::error::RegsyncResult;
use crate::registry::client::RegistryApi;

/// Builds the remote clients used by a mirror run.
///
/// Implementations construct real clients from configuration; tests
/// substitute a factory producing fakes.
pub trait ClientFactory {
    type Registry: RegistryApi + Clone + Send + Sync + 'static;
    type Cluster: ClusterApi + Clone + Send + Sync + 'static;

    fn create_registry_client(
        &self,
    ) -> impl Future<Output = RegsyncResult<Self::Registry>> + Send;

    fn create_cluster_client(&self) -> impl Future<Output = RegsyncResult<Self::Cluster>> + Send;
}

/// Lazily builds and caches one client of each type.
///
/// Each client is constructed at most once per run; later callers share the
/// cached instance.
pub struct ClientManager<F: ClientFactory> {
    factory: F,
    registry: OnceCell<F::Registry>,
    cluster: OnceCell<F::Cluster>,
}

impl<F: ClientFactory> ClientManager<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            registry: OnceCell::new(),
            cluster: OnceCell::new(),
        }
    }

    /// Returns the registry client, building it on first use.
    pub async fn registry_client(&self) -> RegsyncResult<&F::Registry> {
        self.registry
            .get_or_try_init(|| self.factory.create_registry_client())
            .await
    }

    /// Returns the cluster client, building it on first use.
    pub async fn cluster_client(&self) -> RegsyncResult<&F::Cluster> {
        self.cluster
            .get_or_try_init(|| self.factory.create_cluster_client())
            .await
    }
}

/// Factory producing the production clients.
#[derive(Debug, Clone)]
pub struct DefaultClientFactory {
    registry_config: RegistryConfig,
}

impl DefaultClientFactory {
    pub fn new(registry_config: RegistryConfig) -> Self {
        Self { registry_config }
    }
}

impl ClientFactory for DefaultClientFactory {
    type Registry = AcrRegistryClient;
    type Cluster = KubeClusterClient;

    async fn create_registry_client(&self) -> RegsyncResult<AcrRegistryClient> {
        AcrRegistryClient::new(&self.registry_config)
    }

    async fn create_cluster_client(&self) -> RegsyncResult<KubeClusterClient> {
        KubeClusterClient::connect().await
    }
}
