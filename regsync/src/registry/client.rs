use std::future::Future;

use secrecy::SecretString;

use crate::error::RegsyncResult;

/// Number of items requested per page from the registry API.
///
/// A response shorter than this terminates pagination, even on page 1.
pub const PAGE_SIZE: u32 = 50;

/// One repository of the registry instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySummary {
    /// Registry-assigned repository identifier, used for tag listing.
    pub repo_id: String,
    /// Namespace the repository lives in.
    pub namespace: String,
    /// Repository name.
    pub name: String,
}

/// Access to the registry's management API.
///
/// All operations are scoped to the registry instance the client was
/// constructed for. Implementations surface throttling signals as
/// [`crate::error::ErrorKind::Throttled`] so the retry policy can
/// distinguish them from terminal failures.
pub trait RegistryApi {
    /// Lists one page of repositories. Pages are 1-based and sized
    /// [`PAGE_SIZE`].
    fn list_repositories(
        &self,
        page_no: u32,
    ) -> impl Future<Output = RegsyncResult<Vec<RepositorySummary>>> + Send;

    /// Lists one page of tags of a repository. Pages are 1-based and sized
    /// [`PAGE_SIZE`].
    fn list_tags(
        &self,
        repository: &RepositorySummary,
        page_no: u32,
    ) -> impl Future<Output = RegsyncResult<Vec<String>>> + Send;

    /// Returns whether the namespace exists in the registry.
    fn get_namespace(&self, name: &str) -> impl Future<Output = RegsyncResult<bool>> + Send;

    /// Creates a namespace with repository auto-creation enabled and private
    /// default visibility.
    fn create_namespace(&self, name: &str) -> impl Future<Output = RegsyncResult<()>> + Send;

    /// Requests a temporary registry credential.
    ///
    /// Also serves as the liveness probe for an existing runtime login: a
    /// successful call means the credential store entry is still usable.
    fn get_authorization_token(&self)
    -> impl Future<Output = RegsyncResult<SecretString>> + Send;
}
