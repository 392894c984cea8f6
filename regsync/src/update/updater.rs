use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use regsync_config::shared::MirrorConfig;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cluster::workload::{PodTemplateWorkload, WorkloadStore};
use crate::error::{ErrorKind, RegsyncResult};
use crate::types::InventorySnapshot;
use crate::update::plan::rewrite_pod_spec;

/// Settings for one workload update pass.
#[derive(Debug)]
pub struct UpdateSettings {
    /// Maximum number of concurrent (namespace, kind) units.
    pub concurrency: usize,
    /// Pause after each successful resource update.
    pub pacing: Duration,
    /// Short-name substrings that must never be rewritten.
    pub exclusions: Vec<String>,
    /// Short name → full reference lookup of the freshly rebuilt registry
    /// inventory.
    pub registry_lookup: HashMap<String, String>,
}

impl UpdateSettings {
    pub fn from_config(config: &MirrorConfig, registry: &InventorySnapshot) -> Self {
        Self {
            concurrency: config.update.concurrency,
            pacing: Duration::from_secs(config.update.pacing_secs),
            exclusions: config.update.excluded_images.clone(),
            registry_lookup: registry.lookup().clone(),
        }
    }
}

/// Terminal state of one resource update.
///
/// A resource moves `unchanged → pending-update → applied`, looping through
/// `refetch-and-recompute` on every version conflict. Failures surface as
/// errors and are absorbed per resource by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was submitted and accepted.
    Applied,
    /// No container image needed rewriting.
    Unchanged,
}

/// Rewrites workload container images across the configured namespaces.
///
/// Each (namespace, kind) pair is one unit of work bounded by a
/// fixed-capacity gate. Within a unit, resources are processed sequentially
/// with a pacing pause after every applied update, bounding the mutation
/// rate against the cluster API.
pub struct WorkloadUpdater<S> {
    store: S,
    settings: Arc<UpdateSettings>,
}

impl<S> WorkloadUpdater<S>
where
    S: WorkloadStore<Deployment>
        + WorkloadStore<StatefulSet>
        + WorkloadStore<DaemonSet>
        + WorkloadStore<CronJob>
        + Clone
        + Send
        + Sync
        + 'static,
{
    pub fn new(store: S, settings: UpdateSettings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
        }
    }

    /// Updates all four workload kinds in every requested namespace.
    ///
    /// Per-unit failures are logged and never abort sibling units.
    pub async fn run(&self, namespaces: &[String]) {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));

        let mut handles = Vec::with_capacity(namespaces.len() * 4);
        for namespace in namespaces {
            handles.push(self.spawn_unit::<Deployment>(namespace, &semaphore));
            handles.push(self.spawn_unit::<StatefulSet>(namespace, &semaphore));
            handles.push(self.spawn_unit::<DaemonSet>(namespace, &semaphore));
            handles.push(self.spawn_unit::<CronJob>(namespace, &semaphore));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Spawns one (namespace, kind) unit behind the concurrency gate.
    fn spawn_unit<K>(&self, namespace: &str, semaphore: &Arc<Semaphore>) -> JoinHandle<()>
    where
        K: PodTemplateWorkload + Clone + Send + Sync + 'static,
        S: WorkloadStore<K>,
    {
        let store = self.store.clone();
        let settings = self.settings.clone();
        let namespace = namespace.to_owned();
        let semaphore = semaphore.clone();

        tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            if let Err(err) = update_kind::<S, K>(&store, &settings, &namespace).await {
                if err.kind() == ErrorKind::ResourceNotFound {
                    debug!(
                        namespace,
                        kind = %K::KIND,
                        "resource kind not available in namespace, skipping"
                    );
                } else {
                    error!(
                        namespace,
                        kind = %K::KIND,
                        error = %err,
                        "failed to update resources"
                    );
                }
            }
        })
    }
}

/// Processes every resource of one kind in one namespace.
///
/// An absent kind/namespace pair is a normal empty result. A single
/// resource's failure is logged and its siblings continue.
async fn update_kind<S, K>(
    store: &S,
    settings: &UpdateSettings,
    namespace: &str,
) -> RegsyncResult<()>
where
    S: WorkloadStore<K>,
    K: PodTemplateWorkload + Clone,
{
    let resources = match store.list(namespace).await {
        Ok(resources) => resources,
        Err(err) if err.kind() == ErrorKind::ResourceNotFound => Vec::new(),
        Err(err) => return Err(err),
    };

    for resource in resources {
        let name = resource.name().to_owned();

        match update_resource(store, settings, namespace, resource).await {
            Ok(UpdateOutcome::Applied) => {
                info!(namespace, kind = %K::KIND, resource = name, "resource updated");
                tokio::time::sleep(settings.pacing).await;
            }
            Ok(UpdateOutcome::Unchanged) => {}
            Err(err) => {
                error!(
                    namespace,
                    kind = %K::KIND,
                    resource = name,
                    error = %err,
                    "failed to update resource"
                );
            }
        }
    }

    Ok(())
}

/// Runs the rewrite-and-update state machine for one resource.
///
/// On a version conflict the latest object is re-fetched and the rewrite is
/// recomputed against it, since the conflict implies a concurrent change.
/// The loop ends in `applied`, `unchanged` (nothing left to rewrite), or the
/// first non-conflict error.
async fn update_resource<S, K>(
    store: &S,
    settings: &UpdateSettings,
    namespace: &str,
    mut resource: K,
) -> RegsyncResult<UpdateOutcome>
where
    S: WorkloadStore<K>,
    K: PodTemplateWorkload + Clone,
{
    let name = resource.name().to_owned();

    if !rewrite(&mut resource, settings) {
        return Ok(UpdateOutcome::Unchanged);
    }

    loop {
        match store.update(namespace, &name, &resource).await {
            Ok(()) => return Ok(UpdateOutcome::Applied),
            Err(err) if err.kind() == ErrorKind::UpdateConflict => {
                warn!(
                    namespace,
                    kind = %K::KIND,
                    resource = name,
                    "conflict detected while updating resource, retrying"
                );

                resource = store.get(namespace, &name).await?;
                if !rewrite(&mut resource, settings) {
                    // The concurrent writer already carries the target
                    // images; nothing left to submit.
                    return Ok(UpdateOutcome::Unchanged);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

/// Applies the image rewrite to a resource's pod spec.
fn rewrite<K: PodTemplateWorkload>(resource: &mut K, settings: &UpdateSettings) -> bool {
    let name = resource.name().to_owned();
    match resource.pod_spec_mut() {
        Some(spec) => rewrite_pod_spec(
            K::KIND,
            &name,
            spec,
            &settings.exclusions,
            &settings.registry_lookup,
        ),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use regsync_telemetry::init_test_tracing;

    use super::*;
    use crate::test_utils::cluster::{FakeWorkloadStore, cron_job, deployment};

    fn settings(lookup: &[(&str, &str)]) -> UpdateSettings {
        UpdateSettings {
            concurrency: 4,
            pacing: Duration::ZERO,
            exclusions: Vec::new(),
            registry_lookup: lookup
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_deployment_image_is_rewritten() {
        init_test_tracing();
        let store = FakeWorkloadStore::default();
        store.put("apps", deployment("web", "harbor/ns/app:v1"));

        let updater = WorkloadUpdater::new(
            store.clone(),
            settings(&[("app:v1", "reg/mirror/app:v1")]),
        );
        updater.run(&["apps".to_owned()]).await;

        let stored: Deployment = store.get_stored("apps", "web").unwrap();
        let image = stored.spec.unwrap().template.spec.unwrap().containers[0]
            .image
            .clone();
        assert_eq!(image.as_deref(), Some("reg/mirror/app:v1"));
        assert_eq!(store.update_calls::<Deployment>(), 1);
    }

    #[tokio::test]
    async fn test_up_to_date_resource_is_not_updated() {
        let store = FakeWorkloadStore::default();
        store.put("apps", deployment("web", "reg/mirror/app:v1"));

        let updater = WorkloadUpdater::new(
            store.clone(),
            settings(&[("app:v1", "reg/mirror/app:v1")]),
        );
        updater.run(&["apps".to_owned()]).await;

        assert_eq!(store.update_calls::<Deployment>(), 0);
    }

    #[tokio::test]
    async fn test_conflict_retry_converges_on_racing_writer() {
        init_test_tracing();
        let store = FakeWorkloadStore::default();
        store.put("jobs", cron_job("nightly", "harbor/ns/job:v2"));
        // The first update loses the race: a concurrent writer bumps the
        // stored version without touching the image.
        store.inject_conflicts::<CronJob>(1);

        let updater = WorkloadUpdater::new(
            store.clone(),
            settings(&[("job:v2", "reg/mirror/job:v2")]),
        );
        updater.run(&["jobs".to_owned()]).await;

        let stored: CronJob = store.get_stored("jobs", "nightly").unwrap();
        let image = stored
            .spec
            .unwrap()
            .job_template
            .spec
            .unwrap()
            .template
            .spec
            .unwrap()
            .containers[0]
            .image
            .clone();
        // The intended rewrite survived the conflict.
        assert_eq!(image.as_deref(), Some("reg/mirror/job:v2"));
        assert_eq!(store.update_calls::<CronJob>(), 2);
    }

    #[tokio::test]
    async fn test_missing_kind_is_an_empty_result() {
        let store = FakeWorkloadStore::default();
        store.fail_list_with_not_found::<CronJob>();
        store.put("apps", deployment("web", "harbor/ns/app:v1"));

        let updater = WorkloadUpdater::new(
            store.clone(),
            settings(&[("app:v1", "reg/mirror/app:v1")]),
        );
        updater.run(&["apps".to_owned()]).await;

        // The deployment update still went through.
        assert_eq!(store.update_calls::<Deployment>(), 1);
    }
}
