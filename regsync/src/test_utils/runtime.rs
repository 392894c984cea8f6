use std::sync::{Arc, Mutex};

use secrecy::SecretString;

use crate::error::{ErrorKind, RegsyncResult};
use crate::regsync_error;
use crate::runtime::{ContainerRuntime, CredentialStore};

#[derive(Default)]
struct FakeRuntimeInner {
    commands: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
    credential_store_json: Mutex<Option<String>>,
}

/// Recording in-memory container runtime.
///
/// Every operation is recorded as a space-joined command line. A configured
/// failure prefix makes the matching command fail after being recorded.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    inner: Arc<FakeRuntimeInner>,
}

impl FakeRuntime {
    /// Makes commands starting with `prefix` fail.
    pub fn fail_on(&self, prefix: &str) {
        *self.inner.fail_on.lock().unwrap() = Some(prefix.to_owned());
    }

    /// Sets the raw JSON returned by the credential store read.
    pub fn set_credential_store_json(&self, json: &str) {
        *self.inner.credential_store_json.lock().unwrap() = Some(json.to_owned());
    }

    /// All recorded command lines, in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.inner.commands.lock().unwrap().clone()
    }

    fn record(&self, command: String) -> RegsyncResult<()> {
        self.inner.commands.lock().unwrap().push(command.clone());

        let fail_on = self.inner.fail_on.lock().unwrap();
        if let Some(prefix) = fail_on.as_deref()
            && command.starts_with(prefix)
        {
            return Err(regsync_error!(
                ErrorKind::CommandFailed,
                "command exited with a failure status",
                command
            ));
        }

        Ok(())
    }
}

impl ContainerRuntime for FakeRuntime {
    async fn login(
        &self,
        registry: &str,
        username: &str,
        _password: &SecretString,
    ) -> RegsyncResult<()> {
        self.record(format!("login {registry} {username}"))
    }

    async fn pull(&self, image: &str) -> RegsyncResult<()> {
        self.record(format!("pull {image}"))
    }

    async fn tag(&self, source: &str, target: &str) -> RegsyncResult<()> {
        self.record(format!("tag {source} {target}"))
    }

    async fn push(&self, image: &str) -> RegsyncResult<()> {
        self.record(format!("push {image}"))
    }

    async fn read_credential_store(&self) -> RegsyncResult<CredentialStore> {
        let json = self.inner.credential_store_json.lock().unwrap().clone();
        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(CredentialStore::default()),
        }
    }
}
