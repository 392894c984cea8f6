use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use secrecy::SecretString;

use crate::error::{ErrorKind, RegsyncError, RegsyncResult};
use crate::regsync_error;
use crate::registry::client::{PAGE_SIZE, RegistryApi, RepositorySummary};

#[derive(Default)]
struct FakeRegistryInner {
    repositories: Mutex<Vec<RepositorySummary>>,
    tags: Mutex<HashMap<String, Vec<String>>>,
    namespaces: Mutex<HashSet<String>>,
    fail_repository_listing: AtomicBool,
    fail_token: AtomicBool,
    throttle_remaining: AtomicU32,
    list_repository_calls: AtomicU32,
    list_tag_calls: AtomicU32,
    get_namespace_calls: AtomicU32,
    create_namespace_calls: AtomicU32,
}

/// Scripted in-memory registry.
#[derive(Clone, Default)]
pub struct FakeRegistry {
    inner: Arc<FakeRegistryInner>,
}

impl FakeRegistry {
    /// Registers a repository with the given tags.
    pub fn add_repository(&self, namespace: &str, name: &str, tags: &[&str]) {
        let repo_id = format!("crr-{namespace}-{name}");
        self.inner.repositories.lock().unwrap().push(RepositorySummary {
            repo_id: repo_id.clone(),
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        });
        self.inner
            .tags
            .lock()
            .unwrap()
            .insert(repo_id, tags.iter().map(|tag| (*tag).to_owned()).collect());
    }

    /// Registers an existing namespace.
    pub fn add_namespace(&self, name: &str) {
        self.inner.namespaces.lock().unwrap().insert(name.to_owned());
    }

    /// Makes every repository listing call fail.
    pub fn fail_repository_listing(&self) {
        self.inner.fail_repository_listing.store(true, Ordering::SeqCst);
    }

    /// Makes authorization-token calls fail.
    pub fn fail_token(&self) {
        self.inner.fail_token.store(true, Ordering::SeqCst);
    }

    /// Throttles the next `n` listing calls.
    pub fn throttle_next(&self, n: u32) {
        self.inner.throttle_remaining.store(n, Ordering::SeqCst);
    }

    pub fn namespace_exists(&self, name: &str) -> bool {
        self.inner.namespaces.lock().unwrap().contains(name)
    }

    pub fn list_repository_calls(&self) -> u32 {
        self.inner.list_repository_calls.load(Ordering::SeqCst)
    }

    pub fn list_tag_calls(&self) -> u32 {
        self.inner.list_tag_calls.load(Ordering::SeqCst)
    }

    pub fn get_namespace_calls(&self) -> u32 {
        self.inner.get_namespace_calls.load(Ordering::SeqCst)
    }

    pub fn create_namespace_calls(&self) -> u32 {
        self.inner.create_namespace_calls.load(Ordering::SeqCst)
    }

    /// Consumes one throttle charge, returning the error to surface.
    fn maybe_throttle(&self) -> Option<RegsyncError> {
        let remaining = &self.inner.throttle_remaining;
        if remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Some(regsync_error!(
                ErrorKind::Throttled,
                "registry API throttled the request"
            ));
        }

        None
    }
}

/// Slices one 1-based page out of the full item list.
fn paginate<T: Clone>(items: &[T], page_no: u32) -> Vec<T> {
    let start = ((page_no - 1) as usize) * PAGE_SIZE as usize;
    items
        .iter()
        .skip(start)
        .take(PAGE_SIZE as usize)
        .cloned()
        .collect()
}

impl RegistryApi for FakeRegistry {
    async fn list_repositories(&self, page_no: u32) -> RegsyncResult<Vec<RepositorySummary>> {
        self.inner.list_repository_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.maybe_throttle() {
            return Err(err);
        }
        if self.inner.fail_repository_listing.load(Ordering::SeqCst) {
            return Err(regsync_error!(
                ErrorKind::RegistryRequestFailed,
                "repository listing failed"
            ));
        }

        let repositories = self.inner.repositories.lock().unwrap();
        Ok(paginate(&repositories, page_no))
    }

    async fn list_tags(
        &self,
        repository: &RepositorySummary,
        page_no: u32,
    ) -> RegsyncResult<Vec<String>> {
        self.inner.list_tag_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.maybe_throttle() {
            return Err(err);
        }

        let tags = self.inner.tags.lock().unwrap();
        let all = tags.get(&repository.repo_id).cloned().unwrap_or_default();
        Ok(paginate(&all, page_no))
    }

    async fn get_namespace(&self, name: &str) -> RegsyncResult<bool> {
        self.inner.get_namespace_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.namespaces.lock().unwrap().contains(name))
    }

    async fn create_namespace(&self, name: &str) -> RegsyncResult<()> {
        self.inner.create_namespace_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.namespaces.lock().unwrap().insert(name.to_owned());
        Ok(())
    }

    async fn get_authorization_token(&self) -> RegsyncResult<SecretString> {
        if self.inner.fail_token.load(Ordering::SeqCst) {
            return Err(regsync_error!(
                ErrorKind::AuthenticationFailed,
                "failed to obtain an authorization token"
            ));
        }

        Ok(SecretString::from("temporary-password".to_owned()))
    }
}
