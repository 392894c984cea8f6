use std::time::Duration;

use regsync::clients::{ClientManager, DefaultClientFactory};
use regsync::cluster::inventory::fetch_cluster_inventory;
use regsync::diff::{missing_images, remove_excluded};
use regsync::registry::inventory::{RegistryInventorySettings, fetch_registry_inventory};
use regsync::runtime::DockerCli;
use regsync::sync::executor::{SyncExecutor, SyncSettings};
use regsync::update::updater::{UpdateSettings, WorkloadUpdater};
use regsync_config::shared::{MirrorConfig, RegistryConfig, SyncConfig, UpdateConfig};
use tracing::info;

use crate::config::load_mirror_config;

pub async fn start_mirror() -> anyhow::Result<()> {
    info!("starting mirror run");
    let mirror_config = load_mirror_config()?;

    log_config(&mirror_config);

    // Clients are built once and shared by every phase; any construction
    // failure here is fatal.
    let clients = ClientManager::new(DefaultClientFactory::new(mirror_config.registry.clone()));
    let cluster_client = clients.cluster_client().await?;
    let registry_client = clients.registry_client().await?;

    let timeout = Duration::from_secs(mirror_config.sync.timeout_secs);
    let inventory_settings = RegistryInventorySettings::from_config(&mirror_config);

    // The cluster and registry inventories are independent reads.
    let cluster_inventory = fetch_cluster_inventory(cluster_client, timeout).await;
    let registry_inventory =
        fetch_registry_inventory(registry_client.clone(), &inventory_settings).await;

    let missing = remove_excluded(
        missing_images(&cluster_inventory, &registry_inventory),
        &mirror_config.sync.excluded_domains,
    );
    log_missing_report(&missing);

    let executor = SyncExecutor::new(
        registry_client.clone(),
        DockerCli::new(),
        SyncSettings::from_config(&mirror_config),
    );
    executor.run(missing).await?;

    // A fresh registry inventory picks up the images pushed above before any
    // workload is repointed.
    let registry_inventory =
        fetch_registry_inventory(registry_client.clone(), &inventory_settings).await;

    let updater = WorkloadUpdater::new(
        cluster_client.clone(),
        UpdateSettings::from_config(&mirror_config, &registry_inventory),
    );
    updater.run(&mirror_config.cluster.namespaces).await;

    info!("mirror run completed");
    Ok(())
}

/// Logs the references that need to be synced, one line per image.
fn log_missing_report(missing: &[String]) {
    info!(count = missing.len(), "images missing from the registry");
    for (position, image) in missing.iter().enumerate() {
        info!("{:>4}  {}", position + 1, image);
    }
}

fn log_config(config: &MirrorConfig) {
    log_registry_config(&config.registry);
    log_sync_config(&config.sync);
    log_update_config(&config.update);
    info!(
        namespaces = ?config.cluster.namespaces,
        "cluster config"
    );
}

fn log_registry_config(config: &RegistryConfig) {
    info!(
        region_id = config.region_id,
        instance_id = config.instance_id,
        endpoint = config.endpoint,
        registry_addr = config.registry_addr,
        username = config.username,
        requests_per_sec = config.requests_per_sec,
        burst = config.burst,
        "registry config",
    );
}

fn log_sync_config(config: &SyncConfig) {
    info!(
        concurrency = config.concurrency,
        timeout_secs = config.timeout_secs,
        internal_registry_prefix = config.internal_registry_prefix,
        excluded_domains = ?config.excluded_domains,
        namespace_rules = config.namespace_rules.len(),
        "sync config"
    );
}

fn log_update_config(config: &UpdateConfig) {
    info!(
        concurrency = config.concurrency,
        pacing_secs = config.pacing_secs,
        excluded_images = ?config.excluded_images,
        "update config"
    )
}
