use std::sync::Arc;

use regsync_config::shared::MirrorConfig;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::concurrency::shutdown::{create_shutdown_channel, is_shutdown};
use crate::error::RegsyncResult;
use crate::registry::client::RegistryApi;
use crate::runtime::ContainerRuntime;
use crate::sync::namespace::{NamespaceCache, NamespaceRules, choose_namespace};
use crate::sync::task::{SyncContext, SyncTask};
use crate::types::short_name_of;

/// Settings for one sync pass.
#[derive(Debug)]
pub struct SyncSettings {
    /// Host under which mirrored images are addressed.
    pub registry_addr: String,
    /// Host prefix identifying images from the internal registry.
    pub internal_registry_prefix: String,
    /// Username for the runtime login.
    pub username: String,
    /// Maximum number of concurrent per-image tasks.
    pub concurrency: usize,
    /// Ordered namespace mapping rules.
    pub rules: NamespaceRules,
}

impl SyncSettings {
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            registry_addr: config.registry.registry_addr.clone(),
            internal_registry_prefix: config.sync.internal_registry_prefix.clone(),
            username: config.registry.username.clone(),
            concurrency: config.sync.concurrency,
            rules: NamespaceRules::new(config.sync.namespace_rules.clone()),
        }
    }
}

/// Pushes missing images into the registry through the container runtime.
///
/// Logs in once before any per-image work; a login failure is fatal to the
/// whole run. Per-image tasks run under a semaphore bounded by the
/// configured concurrency. A failing task is logged and fires the shutdown
/// signal so no new task is admitted, while already-admitted tasks run to
/// completion (fail-fast admission, best-effort completion).
pub struct SyncExecutor<R, T> {
    registry: R,
    runtime: T,
    settings: Arc<SyncSettings>,
    cache: Arc<NamespaceCache>,
}

impl<R, T> SyncExecutor<R, T>
where
    R: RegistryApi + Clone + Send + Sync + 'static,
    T: ContainerRuntime + Clone + Send + Sync + 'static,
{
    pub fn new(registry: R, runtime: T, settings: SyncSettings) -> Self {
        Self {
            registry,
            runtime,
            settings: Arc::new(settings),
            cache: Arc::new(NamespaceCache::new()),
        }
    }

    /// Runs the sync pass over the missing-image list.
    ///
    /// The returned error is always fatal (login); per-image failures are
    /// absorbed here and only logged.
    pub async fn run(&self, images: Vec<String>) -> RegsyncResult<()> {
        self.login().await?;

        if images.is_empty() {
            info!("no images to sync");
            return Ok(());
        }

        info!(count = images.len(), "syncing missing images");

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let mut handles = Vec::with_capacity(images.len());
        for image in images {
            let registry = self.registry.clone();
            let runtime = self.runtime.clone();
            let settings = self.settings.clone();
            let cache = self.cache.clone();
            let semaphore = semaphore.clone();
            let shutdown_tx = shutdown_tx.clone();
            let mut shutdown_rx = shutdown_rx.clone();

            handles.push(tokio::spawn(async move {
                // Fail-fast admission: once a sibling failed, no new permit
                // is granted. The biased order makes the shutdown check win
                // over a simultaneously available permit.
                let _permit = tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        debug!(image = %image, "skipping image, sync aborted");
                        return;
                    }
                    permit = semaphore.acquire() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };

                let namespace = choose_namespace(
                    &image,
                    &settings.internal_registry_prefix,
                    &settings.rules,
                );
                let target = format!(
                    "{}/{}/{}",
                    settings.registry_addr,
                    namespace,
                    short_name_of(&image)
                );

                let task = SyncTask::for_image(&image, &target, &namespace);
                let ctx = SyncContext {
                    registry: &registry,
                    runtime: &runtime,
                    cache: &cache,
                };

                match task.run(&ctx).await {
                    Ok(()) => info!(image = %image, target = %target, "image synced"),
                    Err(err) => {
                        error!(image = %image, error = %err, "failed to sync image");
                        let _ = shutdown_tx.shutdown();
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        if is_shutdown(&shutdown_rx) {
            info!("sync pass ended early after a task failure");
        }

        Ok(())
    }

    /// Logs in to the registry, short-circuiting when the credential store
    /// already holds a still-valid entry.
    ///
    /// Validity is probed through the authorization-token endpoint. Any
    /// failure past the probe is fatal: without registry write access no
    /// sync can proceed.
    async fn login(&self) -> RegsyncResult<()> {
        match self.runtime.read_credential_store().await {
            Ok(store) if store.has_auth_for(&self.settings.registry_addr) => {
                if self.registry.get_authorization_token().await.is_ok() {
                    info!("already logged in to the registry");
                    return Ok(());
                }

                info!("stored registry login expired, re-login required");
            }
            Ok(_) => {
                debug!("no stored credential for the registry, performing a fresh login");
            }
            Err(err) => {
                debug!(error = %err, "could not read the credential store, performing a fresh login");
            }
        }

        let password = self.registry.get_authorization_token().await?;
        self.runtime
            .login(
                &self.settings.registry_addr,
                &self.settings.username,
                &password,
            )
            .await?;

        info!("logged in to the registry");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use regsync_telemetry::init_test_tracing;

    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::registry::FakeRegistry;
    use crate::test_utils::runtime::FakeRuntime;
    use regsync_config::shared::NamespaceRule;

    fn settings(concurrency: usize) -> SyncSettings {
        SyncSettings {
            registry_addr: "reg.mirror".to_owned(),
            internal_registry_prefix: "harbor.internal".to_owned(),
            username: "mirror".to_owned(),
            concurrency,
            rules: NamespaceRules::new(vec![NamespaceRule {
                matches: "idc-h3-core".to_owned(),
                target: "idc".to_owned(),
            }]),
        }
    }

    #[tokio::test]
    async fn test_sync_pushes_missing_image() {
        init_test_tracing();
        let registry = FakeRegistry::default();
        let runtime = FakeRuntime::default();
        let executor = SyncExecutor::new(registry.clone(), runtime.clone(), settings(2));

        executor
            .run(vec!["harbor.internal/idc-h3-core/app:v1".to_owned()])
            .await
            .unwrap();

        let commands = runtime.commands();
        assert!(commands.contains(&"login reg.mirror mirror".to_owned()));
        assert!(commands.contains(&"pull harbor.internal/idc-h3-core/app:v1".to_owned()));
        assert!(
            commands.contains(
                &"tag harbor.internal/idc-h3-core/app:v1 reg.mirror/idc/app:v1".to_owned()
            )
        );
        assert!(commands.contains(&"push reg.mirror/idc/app:v1".to_owned()));
        assert!(registry.namespace_exists("idc"));
    }

    #[tokio::test]
    async fn test_external_image_lands_in_public_namespace() {
        let registry = FakeRegistry::default();
        let runtime = FakeRuntime::default();
        let executor = SyncExecutor::new(registry.clone(), runtime.clone(), settings(2));

        executor
            .run(vec!["docker.io/library/nginx:1.25".to_owned()])
            .await
            .unwrap();

        assert!(
            runtime
                .commands()
                .contains(&"push reg.mirror/public/nginx:1.25".to_owned())
        );
    }

    #[tokio::test]
    async fn test_login_failure_is_fatal() {
        let registry = FakeRegistry::default();
        registry.fail_token();
        let runtime = FakeRuntime::default();
        let executor = SyncExecutor::new(registry, runtime.clone(), settings(2));

        let err = executor
            .run(vec!["harbor.internal/ns/app:v1".to_owned()])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        // No per-image work may have started.
        assert!(runtime.commands().is_empty());
    }

    #[tokio::test]
    async fn test_stored_credential_short_circuits_login() {
        let registry = FakeRegistry::default();
        let runtime = FakeRuntime::default();
        runtime.set_credential_store_json(
            r#"{"auths": {"reg.mirror": {"auth": "dXNlcjpwYXNz"}}}"#,
        );
        let executor = SyncExecutor::new(registry, runtime.clone(), settings(2));

        executor.run(vec![]).await.unwrap();

        // The runtime login must have been skipped entirely.
        assert!(runtime.commands().is_empty());
    }

    #[tokio::test]
    async fn test_failed_task_stops_new_admissions() {
        init_test_tracing();
        let registry = FakeRegistry::default();
        let runtime = FakeRuntime::default();
        runtime.fail_on("pull harbor.internal/ns/bad:1");
        // Concurrency 1 forces strictly sequential admission.
        let executor = SyncExecutor::new(registry, runtime.clone(), settings(1));

        executor
            .run(vec![
                "harbor.internal/ns/bad:1".to_owned(),
                "harbor.internal/ns/good:1".to_owned(),
            ])
            .await
            .unwrap();

        let commands = runtime.commands();
        assert!(commands.contains(&"pull harbor.internal/ns/bad:1".to_owned()));
        // The second image must never have been admitted.
        assert!(!commands.iter().any(|c| c.contains("good:1")));
    }
}
