use std::fmt;
use std::future::Future;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::PodSpec;

use crate::error::RegsyncResult;

/// The workload kinds whose container images are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    CronJob,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::StatefulSet => "statefulset",
            WorkloadKind::DaemonSet => "daemonset",
            WorkloadKind::CronJob => "cronjob",
        };
        f.write_str(name)
    }
}

/// A workload object exposing an updatable pod spec.
///
/// Implemented for the four supported kinds so the updater can run one
/// generic rewrite-and-update loop instead of one copy per kind. The cron
/// job pod spec sits one level deeper than the others, behind its job
/// template.
pub trait PodTemplateWorkload {
    const KIND: WorkloadKind;

    /// The object's name, empty if the API returned none.
    fn name(&self) -> &str;

    /// Mutable access to the pod spec the object templates, if present.
    fn pod_spec_mut(&mut self) -> Option<&mut PodSpec>;
}

impl PodTemplateWorkload for Deployment {
    const KIND: WorkloadKind = WorkloadKind::Deployment;

    fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        self.spec.as_mut()?.template.spec.as_mut()
    }
}

impl PodTemplateWorkload for StatefulSet {
    const KIND: WorkloadKind = WorkloadKind::StatefulSet;

    fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        self.spec.as_mut()?.template.spec.as_mut()
    }
}

impl PodTemplateWorkload for DaemonSet {
    const KIND: WorkloadKind = WorkloadKind::DaemonSet;

    fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        self.spec.as_mut()?.template.spec.as_mut()
    }
}

impl PodTemplateWorkload for CronJob {
    const KIND: WorkloadKind = WorkloadKind::CronJob;

    fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        self.spec
            .as_mut()?
            .job_template
            .spec
            .as_mut()?
            .template
            .spec
            .as_mut()
    }
}

/// Per-kind access to workload objects.
///
/// `get` exists solely for the conflict-retry re-fetch; listing and updating
/// are the steady-state operations. Implementations map a version conflict
/// to [`crate::error::ErrorKind::UpdateConflict`] and an absent resource
/// kind or namespace to [`crate::error::ErrorKind::ResourceNotFound`].
pub trait WorkloadStore<K> {
    /// Lists all objects of the kind in a namespace.
    fn list(&self, namespace: &str) -> impl Future<Output = RegsyncResult<Vec<K>>> + Send;

    /// Fetches the latest version of one object.
    fn get(&self, namespace: &str, name: &str) -> impl Future<Output = RegsyncResult<K>> + Send;

    /// Submits an updated object, failing with a conflict when the cluster
    /// holds a newer version.
    fn update(
        &self,
        namespace: &str,
        name: &str,
        resource: &K,
    ) -> impl Future<Output = RegsyncResult<()>> + Send;
}
