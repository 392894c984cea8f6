use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::cluster::client::{ClusterApi, PodImages};
use crate::concurrency::shutdown::deadline_shutdown;
use crate::types::InventorySnapshot;

/// Capacity of the channel buffering discovered image references.
const IMAGE_CHANNEL_CAPACITY: usize = 1000;

/// Number of batches the pod list is partitioned into.
const POD_BATCHES: usize = 10;

/// Builds an [`InventorySnapshot`] of every container and init-container
/// image currently referenced by any pod in any namespace.
///
/// Pods are listed in one call, partitioned into [`POD_BATCHES`] roughly
/// equal batches processed concurrently; every batch worker emits its images
/// into a bounded channel drained by this coordinator, which deduplicates by
/// full reference. A listing failure or deadline degrades to an empty
/// snapshot.
pub async fn fetch_cluster_inventory<C: ClusterApi>(
    client: &C,
    timeout: Duration,
) -> InventorySnapshot {
    let (_shutdown_tx, shutdown_rx) = deadline_shutdown(timeout);

    let pods = {
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::select! {
            result = client.list_all_pods() => match result {
                Ok(pods) => pods,
                Err(err) => {
                    error!(error = %err, "failed to list pods, returning an empty cluster inventory");
                    return InventorySnapshot::default();
                }
            },
            _ = shutdown_rx.changed() => {
                error!("timed out listing pods, returning an empty cluster inventory");
                return InventorySnapshot::default();
            }
        }
    };

    debug!(count = pods.len(), "listed cluster pods");

    let (image_tx, mut image_rx) = mpsc::channel::<String>(IMAGE_CHANNEL_CAPACITY);

    let batch_size = pods.len().div_ceil(POD_BATCHES).max(1);
    let mut handles = Vec::with_capacity(POD_BATCHES);

    let mut pods = pods;
    while !pods.is_empty() {
        let batch: Vec<PodImages> = pods.drain(..batch_size.min(pods.len())).collect();
        let image_tx = image_tx.clone();
        let mut shutdown_rx = shutdown_rx.clone();

        handles.push(tokio::spawn(async move {
            for pod in batch {
                for image in pod.containers.into_iter().chain(pod.init_containers) {
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            error!("timed out while collecting pod images");
                            return;
                        }
                        permit = image_tx.reserve() => match permit {
                            Ok(permit) => permit.send(image),
                            Err(_) => return,
                        },
                    }
                }
            }
        }));
    }

    drop(image_tx);

    let mut images = Vec::new();
    while let Some(image) = image_rx.recv().await {
        images.push(image);
    }

    for handle in handles {
        let _ = handle.await;
    }

    InventorySnapshot::from_images(images)
}

#[cfg(test)]
mod tests {
    use regsync_telemetry::init_test_tracing;

    use super::*;
    use crate::test_utils::cluster::FakeCluster;

    fn pod(containers: &[&str], init_containers: &[&str]) -> PodImages {
        PodImages {
            containers: containers.iter().map(|s| (*s).to_owned()).collect(),
            init_containers: init_containers.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[tokio::test]
    async fn test_inventory_collects_containers_and_init_containers() {
        init_test_tracing();
        let cluster = FakeCluster::default();
        cluster.add_pod(pod(&["reg/ns/app:v1"], &["reg/ns/init:v1"]));

        let snapshot = fetch_cluster_inventory(&cluster, Duration::from_secs(5)).await;

        let mut images = snapshot.images().to_vec();
        images.sort();
        assert_eq!(images, ["reg/ns/app:v1", "reg/ns/init:v1"]);
    }

    #[tokio::test]
    async fn test_inventory_dedups_by_full_reference() {
        let cluster = FakeCluster::default();
        for _ in 0..3 {
            cluster.add_pod(pod(&["reg/ns/app:v1"], &[]));
        }
        cluster.add_pod(pod(&["other/ns/app:v1"], &[]));

        let snapshot = fetch_cluster_inventory(&cluster, Duration::from_secs(5)).await;

        // Same short name from two hosts: both full references survive.
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_short_name("app:v1"));
    }

    #[tokio::test]
    async fn test_listing_failure_degrades_to_empty_snapshot() {
        let cluster = FakeCluster::default();
        cluster.fail_listing();

        let snapshot = fetch_cluster_inventory(&cluster, Duration::from_secs(5)).await;
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_empty_cluster_produces_empty_snapshot() {
        let cluster = FakeCluster::default();
        let snapshot = fetch_cluster_inventory(&cluster, Duration::from_secs(5)).await;
        assert!(snapshot.is_empty());
    }
}
