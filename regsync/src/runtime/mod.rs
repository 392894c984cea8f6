use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::process::Command;

use crate::bail;
use crate::error::{ErrorKind, RegsyncResult};

/// Default location of the docker credential store.
const DEFAULT_CREDENTIAL_STORE: &str = "/root/.docker/config.json";

/// Structure of the docker credential store file.
///
/// Only the `auths` section matters: a non-empty entry for the registry host
/// means a previous login may still be valid.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialStore {
    #[serde(default)]
    pub auths: HashMap<String, StoredAuth>,
}

/// One stored registry credential.
#[derive(Debug, Default, Deserialize)]
pub struct StoredAuth {
    #[serde(default)]
    pub auth: String,
}

impl CredentialStore {
    /// Returns whether a non-empty credential is stored for the registry.
    pub fn has_auth_for(&self, registry: &str) -> bool {
        self.auths
            .get(registry)
            .is_some_and(|auth| !auth.auth.is_empty())
    }
}

/// The container runtime operations the sync pipeline shells out for.
pub trait ContainerRuntime {
    /// Logs in to the registry with a temporary credential.
    fn login(
        &self,
        registry: &str,
        username: &str,
        password: &SecretString,
    ) -> impl Future<Output = RegsyncResult<()>> + Send;

    /// Pulls an image from its source registry.
    fn pull(&self, image: &str) -> impl Future<Output = RegsyncResult<()>> + Send;

    /// Tags a pulled image under a new reference.
    fn tag(&self, source: &str, target: &str) -> impl Future<Output = RegsyncResult<()>> + Send;

    /// Pushes a tagged image to its registry.
    fn push(&self, image: &str) -> impl Future<Output = RegsyncResult<()>> + Send;

    /// Reads the local credential store, used to decide whether a login can
    /// be skipped.
    fn read_credential_store(&self) -> impl Future<Output = RegsyncResult<CredentialStore>> + Send;
}

/// [`ContainerRuntime`] implementation shelling out to the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    credential_store: PathBuf,
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            credential_store: PathBuf::from(DEFAULT_CREDENTIAL_STORE),
        }
    }

    /// Overrides the credential store location.
    pub fn with_credential_store(path: &Path) -> Self {
        Self {
            credential_store: path.to_owned(),
        }
    }

    /// Runs a docker subcommand, inheriting stdout/stderr so runtime output
    /// lands in the service logs.
    async fn run(&self, args: &[&str]) -> RegsyncResult<()> {
        let status = Command::new("docker")
            .args(args)
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            bail!(
                ErrorKind::CommandFailed,
                "command exited with a failure status",
                format!("docker {}", args.join(" "))
            );
        }

        Ok(())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerRuntime for DockerCli {
    async fn login(
        &self,
        registry: &str,
        username: &str,
        password: &SecretString,
    ) -> RegsyncResult<()> {
        // The credential is exposed only inside the spawned process
        // arguments; it is never logged.
        let status = Command::new("docker")
            .args(["login", registry, "-u", username, "-p"])
            .arg(password.expose_secret())
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            bail!(
                ErrorKind::CommandFailed,
                "command exited with a failure status",
                format!("docker login {registry}")
            );
        }

        Ok(())
    }

    async fn pull(&self, image: &str) -> RegsyncResult<()> {
        self.run(&["pull", image]).await
    }

    async fn tag(&self, source: &str, target: &str) -> RegsyncResult<()> {
        self.run(&["tag", source, target]).await
    }

    async fn push(&self, image: &str) -> RegsyncResult<()> {
        self.run(&["push", image]).await
    }

    async fn read_credential_store(&self) -> RegsyncResult<CredentialStore> {
        let contents = tokio::fs::read(&self.credential_store).await?;
        let store = serde_json::from_slice(&contents)?;

        Ok(store)
    }
}
