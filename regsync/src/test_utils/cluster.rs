use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::cluster::client::{ClusterApi, PodImages};
use crate::cluster::workload::{PodTemplateWorkload, WorkloadStore};
use crate::error::{ErrorKind, RegsyncResult};
use crate::regsync_error;

/// Scripted in-memory pod lister.
#[derive(Clone, Default)]
pub struct FakeCluster {
    pods: Arc<Mutex<Vec<PodImages>>>,
    fail_listing: Arc<AtomicBool>,
}

impl FakeCluster {
    pub fn add_pod(&self, pod: PodImages) {
        self.pods.lock().unwrap().push(pod);
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }
}

impl ClusterApi for FakeCluster {
    async fn list_all_pods(&self) -> RegsyncResult<Vec<PodImages>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(regsync_error!(
                ErrorKind::ClusterRequestFailed,
                "pod listing failed"
            ));
        }

        Ok(self.pods.lock().unwrap().clone())
    }
}

/// Per-kind state of the fake workload store.
struct KindState<K> {
    objects: HashMap<(String, String), K>,
    update_calls: u32,
    conflicts_to_inject: u32,
    list_not_found: bool,
}

impl<K> Default for KindState<K> {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
            update_calls: 0,
            conflicts_to_inject: 0,
            list_not_found: false,
        }
    }
}

/// In-memory workload store over all four kinds.
///
/// Conflict injection models a racing writer: the next `n` update calls of a
/// kind are rejected with a version conflict without being stored, so the
/// caller has to re-fetch and recompute.
#[derive(Clone, Default)]
pub struct FakeWorkloadStore {
    inner: Arc<Mutex<HashMap<TypeId, Box<dyn Any + Send>>>>,
}

impl FakeWorkloadStore {
    fn with_state<K: 'static + Send, R>(&self, f: impl FnOnce(&mut KindState<K>) -> R) -> R {
        let mut map = self.inner.lock().unwrap();
        let state = map
            .entry(TypeId::of::<K>())
            .or_insert_with(|| Box::new(KindState::<K>::default()));
        f(state.downcast_mut().expect("kind state type mismatch"))
    }

    /// Stores an object in a namespace under its own name.
    pub fn put<K>(&self, namespace: &str, object: K)
    where
        K: PodTemplateWorkload + Send + 'static,
    {
        let key = (namespace.to_owned(), object.name().to_owned());
        self.with_state::<K, _>(|state| {
            state.objects.insert(key, object);
        });
    }

    /// Returns the currently stored version of an object.
    pub fn get_stored<K>(&self, namespace: &str, name: &str) -> Option<K>
    where
        K: PodTemplateWorkload + Clone + Send + 'static,
    {
        let key = (namespace.to_owned(), name.to_owned());
        self.with_state::<K, _>(|state| state.objects.get(&key).cloned())
    }

    /// Number of update calls seen for a kind, conflicted ones included.
    pub fn update_calls<K: Send + 'static>(&self) -> u32 {
        self.with_state::<K, _>(|state| state.update_calls)
    }

    /// Rejects the next `n` updates of a kind with a version conflict.
    pub fn inject_conflicts<K: Send + 'static>(&self, n: u32) {
        self.with_state::<K, _>(|state| state.conflicts_to_inject = n);
    }

    /// Makes listing this kind fail as not-found, as an aggregated API
    /// without the kind would.
    pub fn fail_list_with_not_found<K: Send + 'static>(&self) {
        self.with_state::<K, _>(|state| state.list_not_found = true);
    }
}

impl<K> WorkloadStore<K> for FakeWorkloadStore
where
    K: PodTemplateWorkload + Clone + Send + Sync + 'static,
{
    async fn list(&self, namespace: &str) -> RegsyncResult<Vec<K>> {
        self.with_state::<K, _>(|state| {
            if state.list_not_found {
                return Err(regsync_error!(
                    ErrorKind::ResourceNotFound,
                    "cluster resource not found"
                ));
            }

            Ok(state
                .objects
                .iter()
                .filter(|((ns, _), _)| ns == namespace)
                .map(|(_, object)| object.clone())
                .collect())
        })
    }

    async fn get(&self, namespace: &str, name: &str) -> RegsyncResult<K> {
        let key = (namespace.to_owned(), name.to_owned());
        self.with_state::<K, _>(|state| {
            state.objects.get(&key).cloned().ok_or_else(|| {
                regsync_error!(ErrorKind::ResourceNotFound, "cluster resource not found")
            })
        })
    }

    async fn update(&self, namespace: &str, name: &str, resource: &K) -> RegsyncResult<()> {
        let key = (namespace.to_owned(), name.to_owned());
        self.with_state::<K, _>(|state| {
            state.update_calls += 1;

            if state.conflicts_to_inject > 0 {
                state.conflicts_to_inject -= 1;
                return Err(regsync_error!(
                    ErrorKind::UpdateConflict,
                    "cluster resource version conflict"
                ));
            }

            state.objects.insert(key, resource.clone());
            Ok(())
        })
    }
}

/// Builds a pod template spec with one named container.
fn pod_template(image: &str) -> PodTemplateSpec {
    PodTemplateSpec {
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "main".to_owned(),
                image: Some(image.to_owned()),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Builds a deployment with one container.
pub fn deployment(name: &str, image: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            ..Default::default()
        },
        spec: Some(k8s_openapi::api::apps::v1::DeploymentSpec {
            template: pod_template(image),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Builds a cron job with one container.
pub fn cron_job(name: &str, image: &str) -> CronJob {
    CronJob {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            ..Default::default()
        },
        spec: Some(k8s_openapi::api::batch::v1::CronJobSpec {
            job_template: k8s_openapi::api::batch::v1::JobTemplateSpec {
                spec: Some(k8s_openapi::api::batch::v1::JobSpec {
                    template: pod_template(image),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
