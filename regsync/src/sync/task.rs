use tracing::debug;

use crate::error::RegsyncResult;
use crate::registry::client::RegistryApi;
use crate::runtime::ContainerRuntime;
use crate::sync::namespace::{NamespaceCache, ensure_namespace};

/// One step of the per-image sync pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStep {
    /// Pull the source image through the container runtime.
    Pull { image: String },
    /// Make sure the target namespace exists in the registry.
    EnsureNamespace { namespace: String },
    /// Tag the pulled image under its target reference.
    Tag { source: String, target: String },
    /// Push the target reference into the registry.
    Push { image: String },
}

impl SyncStep {
    /// Short step name used in logs.
    pub fn describe(&self) -> &'static str {
        match self {
            SyncStep::Pull { .. } => "pull",
            SyncStep::EnsureNamespace { .. } => "ensure-namespace",
            SyncStep::Tag { .. } => "tag",
            SyncStep::Push { .. } => "push",
        }
    }

    async fn run<R, T>(&self, ctx: &SyncContext<'_, R, T>) -> RegsyncResult<()>
    where
        R: RegistryApi + Sync,
        T: ContainerRuntime + Sync,
    {
        match self {
            SyncStep::Pull { image } => ctx.runtime.pull(image).await,
            SyncStep::EnsureNamespace { namespace } => {
                ensure_namespace(ctx.registry, ctx.cache, namespace).await
            }
            SyncStep::Tag { source, target } => ctx.runtime.tag(source, target).await,
            SyncStep::Push { image } => ctx.runtime.push(image).await,
        }
    }
}

/// Collaborators shared by all steps of one sync task.
pub struct SyncContext<'a, R, T> {
    pub registry: &'a R,
    pub runtime: &'a T,
    pub cache: &'a NamespaceCache,
}

/// Ordered step sequence for mirroring one image.
///
/// Steps run strictly sequentially; the first failing step aborts the
/// remaining ones. The failure only affects this image, never its siblings.
#[derive(Debug, Clone)]
pub struct SyncTask {
    steps: Vec<SyncStep>,
}

impl SyncTask {
    pub fn new(steps: Vec<SyncStep>) -> Self {
        Self { steps }
    }

    /// Builds the standard pull → ensure-namespace → tag → push sequence for
    /// one image.
    pub fn for_image(source: &str, target: &str, namespace: &str) -> Self {
        Self::new(vec![
            SyncStep::Pull {
                image: source.to_owned(),
            },
            SyncStep::EnsureNamespace {
                namespace: namespace.to_owned(),
            },
            SyncStep::Tag {
                source: source.to_owned(),
                target: target.to_owned(),
            },
            SyncStep::Push {
                image: target.to_owned(),
            },
        ])
    }

    /// Runs every step in order, stopping at the first failure.
    pub async fn run<R, T>(&self, ctx: &SyncContext<'_, R, T>) -> RegsyncResult<()>
    where
        R: RegistryApi + Sync,
        T: ContainerRuntime + Sync,
    {
        for step in &self.steps {
            debug!(step = step.describe(), "running sync step");
            step.run(ctx).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::registry::FakeRegistry;
    use crate::test_utils::runtime::FakeRuntime;

    #[tokio::test]
    async fn test_task_runs_all_steps_in_order() {
        let registry = FakeRegistry::default();
        registry.add_namespace("idc");
        let runtime = FakeRuntime::default();
        let cache = NamespaceCache::new();

        let task = SyncTask::for_image("harbor/idc/app:v1", "reg/idc/app:v1", "idc");
        let ctx = SyncContext {
            registry: &registry,
            runtime: &runtime,
            cache: &cache,
        };
        task.run(&ctx).await.unwrap();

        assert_eq!(
            runtime.commands(),
            [
                "pull harbor/idc/app:v1",
                "tag harbor/idc/app:v1 reg/idc/app:v1",
                "push reg/idc/app:v1",
            ]
        );
        assert!(cache.contains("idc"));
    }

    #[tokio::test]
    async fn test_first_failing_step_aborts_the_rest() {
        let registry = FakeRegistry::default();
        registry.add_namespace("idc");
        let runtime = FakeRuntime::default();
        runtime.fail_on("tag harbor/idc/app:v1");
        let cache = NamespaceCache::new();

        let task = SyncTask::for_image("harbor/idc/app:v1", "reg/idc/app:v1", "idc");
        let ctx = SyncContext {
            registry: &registry,
            runtime: &runtime,
            cache: &cache,
        };
        let err = task.run(&ctx).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        // The push must never have been attempted.
        assert_eq!(
            runtime.commands(),
            ["pull harbor/idc/app:v1", "tag harbor/idc/app:v1 reg/idc/app:v1"]
        );
    }
}
