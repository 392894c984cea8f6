use std::sync::Arc;
use std::time::Duration;

use regsync_config::shared::MirrorConfig;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, warn};

use crate::bail;
use crate::concurrency::rate::RateLimiter;
use crate::concurrency::retry::{RetryPolicy, retry_with_policy};
use crate::concurrency::shutdown::{ShutdownRx, deadline_shutdown};
use crate::error::{ErrorKind, RegsyncResult};
use crate::registry::client::{PAGE_SIZE, RegistryApi, RepositorySummary};
use crate::types::{ImageRef, InventorySnapshot};

/// Capacity of the channel buffering discovered image references.
const IMAGE_CHANNEL_CAPACITY: usize = 300;

/// Settings for one registry inventory pass.
#[derive(Debug, Clone)]
pub struct RegistryInventorySettings {
    /// Host under which discovered images are addressed in the snapshot.
    pub registry_addr: String,
    /// Maximum number of concurrent per-repository tag listing workers.
    pub concurrency: usize,
    /// Hard deadline for the whole pass.
    pub timeout: Duration,
    /// Sustained registry API request rate, per second.
    pub requests_per_sec: u32,
    /// Burst allowance on top of the sustained rate.
    pub burst: u32,
    /// Retry policy for throttled calls.
    pub retry: RetryPolicy,
}

impl RegistryInventorySettings {
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            registry_addr: config.registry.registry_addr.clone(),
            concurrency: config.sync.concurrency,
            timeout: Duration::from_secs(config.sync.timeout_secs),
            requests_per_sec: config.registry.requests_per_sec,
            burst: config.registry.burst,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

/// Builds an [`InventorySnapshot`] covering every tag of every repository in
/// the registry.
///
/// Repository listing is paginated under the rate limiter and retry policy.
/// Tag listing fans out per repository under a semaphore bounded by the
/// configured concurrency; workers send discovered references into a bounded
/// channel drained by this coordinator, which is the only writer to the
/// snapshot. A deadline shutdown signal aborts all in-flight waits once the
/// timeout elapses.
///
/// An unrecoverable repository listing failure degrades to an empty snapshot
/// rather than an error; the caller decides whether that is fatal.
pub async fn fetch_registry_inventory<R>(
    client: R,
    settings: &RegistryInventorySettings,
) -> InventorySnapshot
where
    R: RegistryApi + Clone + Send + Sync + 'static,
{
    let (_shutdown_tx, shutdown_rx) = deadline_shutdown(settings.timeout);
    let limiter = Arc::new(RateLimiter::new(
        settings.requests_per_sec,
        settings.burst,
    ));

    let repositories = {
        let mut shutdown_rx = shutdown_rx.clone();
        match list_all_repositories(&client, &limiter, &settings.retry, &mut shutdown_rx).await {
            Ok(repositories) => repositories,
            Err(err) => {
                error!(
                    error = %err,
                    "failed to list repositories, returning an empty registry inventory"
                );
                return InventorySnapshot::default();
            }
        }
    };

    debug!(count = repositories.len(), "listed registry repositories");

    let (image_tx, mut image_rx) = mpsc::channel::<String>(IMAGE_CHANNEL_CAPACITY);
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));

    let mut handles = Vec::with_capacity(repositories.len());
    for repository in repositories {
        let client = client.clone();
        let registry_addr = settings.registry_addr.clone();
        let retry = settings.retry.clone();
        let limiter = limiter.clone();
        let semaphore = semaphore.clone();
        let image_tx = image_tx.clone();
        let mut shutdown_rx = shutdown_rx.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            if let Err(err) = list_repository_tags(
                &client,
                &registry_addr,
                &repository,
                &image_tx,
                &limiter,
                &retry,
                &mut shutdown_rx,
            )
            .await
            {
                error!(
                    repository = repository.name,
                    error = %err,
                    "failed to list repository tags"
                );
            }
        }));
    }

    // The coordinator's sender must go away so the drain below terminates
    // once every worker has finished.
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

/// Lists every repository of the instance through fixed-size pages.
///
/// A page shorter than [`PAGE_SIZE`] terminates the walk, even on page 1.
async fn list_all_repositories<R: RegistryApi>(
    client: &R,
    limiter: &RateLimiter,
    retry: &RetryPolicy,
    shutdown_rx: &mut ShutdownRx,
) -> RegsyncResult<Vec<RepositorySummary>> {
    let mut repositories = Vec::new();
    let mut page_no = 1;

    let limiter_rx = shutdown_rx.clone();

    loop {
        let page = retry_with_policy(retry, shutdown_rx, || {
            let mut limiter_rx = limiter_rx.clone();
            async move {
                limiter.acquire(&mut limiter_rx).await?;
                client.list_repositories(page_no).await
            }
        })
        .await?;

        let page_len = page.len();
        repositories.extend(page);

        if page_len < PAGE_SIZE as usize {
            break;
        }

        page_no += 1;
    }

    Ok(repositories)
}

/// Lists every tag of one repository and sends the resulting references into
/// the image channel.
///
/// A repository with no tags at all logs a warning and contributes nothing.
async fn list_repository_tags<R: RegistryApi>(
    client: &R,
    registry_addr: &str,
    repository: &RepositorySummary,
    image_tx: &mpsc::Sender<String>,
    limiter: &RateLimiter,
    retry: &RetryPolicy,
    shutdown_rx: &mut ShutdownRx,
) -> RegsyncResult<()> {
    let mut page_no = 1;
    let limiter_rx = shutdown_rx.clone();

    loop {
        let tags = retry_with_policy(retry, shutdown_rx, || {
            let mut limiter_rx = limiter_rx.clone();
            async move {
                limiter.acquire(&mut limiter_rx).await?;
                client.list_tags(repository, page_no).await
            }
        })
        .await?;

        if tags.is_empty() {
            if page_no == 1 {
                warn!(repository = repository.name, "no tags found in repository");
            }
            break;
        }

        let tags_len = tags.len();
        for tag in tags {
            let image =
                ImageRef::new(registry_addr, &repository.namespace, &repository.name, &tag)
                    .to_string();

            // The send must not outwait the run deadline when the channel is
            // full.
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    bail!(
                        ErrorKind::OperationCanceled,
                        "timed out while sending discovered image"
                    );
                }
                permit = image_tx.reserve() => match permit {
                    Ok(permit) => permit.send(image),
                    // The coordinator stopped draining; nothing left to do.
                    Err(_) => return Ok(()),
                },
            }
        }

        if tags_len < PAGE_SIZE as usize {
            break;
        }

        page_no += 1;
    }

    Ok(())
}
