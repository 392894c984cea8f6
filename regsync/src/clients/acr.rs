use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use regsync_config::shared::RegistryConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::bail;
use crate::error::{ErrorKind, RegsyncResult};
use crate::registry::client::{PAGE_SIZE, RegistryApi, RepositorySummary};
use crate::regsync_error;

type HmacSha256 = Hmac<Sha256>;

/// Version of the registry OpenAPI this client speaks.
const API_VERSION: &str = "2018-12-01";

/// Signature algorithm identifier sent in the `Authorization` header.
const SIGNATURE_ALGORITHM: &str = "ACS3-HMAC-SHA256";

/// Response code of successful business calls.
const SUCCESS_CODE: &str = "success";

/// Response code returned when the queried namespace does not exist.
const NAMESPACE_NOT_EXIST_CODE: &str = "NAMESPACE_NOT_EXIST";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry client speaking the management API's signed RPC protocol.
///
/// Requests are signed with ACS3-HMAC-SHA256 over the canonical request.
/// Throttling responses surface as the retryable
/// [`ErrorKind::Throttled`]; a missing namespace surfaces as
/// [`ErrorKind::ResourceNotFound`].
#[derive(Clone)]
pub struct AcrRegistryClient {
    http: reqwest::Client,
    endpoint: String,
    instance_id: String,
    access_key_id: String,
    access_key_secret: SecretString,
}

impl AcrRegistryClient {
    pub fn new(config: &RegistryConfig) -> RegsyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            instance_id: config.instance_id.clone(),
            access_key_id: config.access_key_id.clone(),
            access_key_secret: config.access_key_secret.clone().into(),
        })
    }

    /// Issues one signed RPC call and deserializes the response body.
    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        mut params: Vec<(String, String)>,
    ) -> RegsyncResult<T> {
        params.sort();
        let canonical_query = params
            .iter()
            .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        let payload_hash = hex::encode(Sha256::digest(b""));
        let date = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let nonce = Uuid::new_v4().simple().to_string();

        // Lowercase header names in lexical order, as the canonical request
        // requires.
        let headers = [
            ("host", self.endpoint.as_str()),
            ("x-acs-action", action),
            ("x-acs-content-sha256", payload_hash.as_str()),
            ("x-acs-date", date.as_str()),
            ("x-acs-signature-nonce", nonce.as_str()),
            ("x-acs-version", API_VERSION),
        ];

        let canonical_headers = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect::<String>();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "GET\n/\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
        );
        let string_to_sign = format!(
            "{SIGNATURE_ALGORITHM}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let mut mac = HmacSha256::new_from_slice(
            self.access_key_secret.expose_secret().as_bytes(),
        )
        .map_err(|err| {
            regsync_error!(
                ErrorKind::AuthenticationFailed,
                "failed to initialize the request signer",
                err
            )
        })?;
        mac.update(string_to_sign.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let authorization = format!(
            "{SIGNATURE_ALGORITHM} Credential={},SignedHeaders={signed_headers},Signature={signature}",
            self.access_key_id
        );

        let url = format!("https://{}/?{}", self.endpoint, canonical_query);
        let response = self
            .http
            .get(&url)
            .header("Authorization", authorization)
            .header("x-acs-action", action)
            .header("x-acs-content-sha256", payload_hash)
            .header("x-acs-date", date)
            .header("x-acs-signature-nonce", nonce)
            .header("x-acs-version", API_VERSION)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let error: ApiErrorBody = serde_json::from_slice(&body).unwrap_or_default();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || error.code.contains("Throttling")
            {
                bail!(
                    ErrorKind::Throttled,
                    "registry API throttled the request",
                    format!("{action}: {}", error.code)
                );
            }
            if error.code == NAMESPACE_NOT_EXIST_CODE {
                bail!(
                    ErrorKind::ResourceNotFound,
                    "namespace does not exist",
                    error.code
                );
            }
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                bail!(
                    ErrorKind::AuthenticationFailed,
                    "registry API rejected the request credentials",
                    format!("{action}: {} {}", error.code, error.message)
                );
            }

            bail!(
                ErrorKind::RegistryRequestFailed,
                "registry API returned an error response",
                format!("{action}: {status} {} {}", error.code, error.message)
            );
        }

        Ok(serde_json::from_slice(&body)?)
    }

    /// Validates the business-level response code of a successful HTTP call.
    fn check_code(action: &'static str, code: &str) -> RegsyncResult<()> {
        if code.contains("Throttling") {
            bail!(
                ErrorKind::Throttled,
                "registry API throttled the request",
                action
            );
        }
        if !code.is_empty() && code != SUCCESS_CODE {
            bail!(
                ErrorKind::RegistryRequestFailed,
                "registry API returned a failure code",
                format!("{action}: {code}")
            );
        }

        Ok(())
    }
}

impl RegistryApi for AcrRegistryClient {
    async fn list_repositories(&self, page_no: u32) -> RegsyncResult<Vec<RepositorySummary>> {
        let response: ListRepositoryResponse = self
            .call(
                "ListRepository",
                vec![
                    ("InstanceId".to_owned(), self.instance_id.clone()),
                    ("PageNo".to_owned(), page_no.to_string()),
                    ("PageSize".to_owned(), PAGE_SIZE.to_string()),
                ],
            )
            .await?;
        Self::check_code("ListRepository", &response.code)?;

        Ok(response
            .repositories
            .into_iter()
            .map(|repository| RepositorySummary {
                repo_id: repository.repo_id,
                namespace: repository.repo_namespace_name,
                name: repository.repo_name,
            })
            .collect())
    }

    async fn list_tags(
        &self,
        repository: &RepositorySummary,
        page_no: u32,
    ) -> RegsyncResult<Vec<String>> {
        let response: ListRepoTagResponse = self
            .call(
                "ListRepoTag",
                vec![
                    ("InstanceId".to_owned(), self.instance_id.clone()),
                    ("RepoId".to_owned(), repository.repo_id.clone()),
                    ("PageNo".to_owned(), page_no.to_string()),
                    ("PageSize".to_owned(), PAGE_SIZE.to_string()),
                ],
            )
            .await?;
        Self::check_code("ListRepoTag", &response.code)?;

        Ok(response.images.into_iter().map(|image| image.tag).collect())
    }

    async fn get_namespace(&self, name: &str) -> RegsyncResult<bool> {
        let result: RegsyncResult<GetNamespaceResponse> = self
            .call(
                "GetNamespace",
                vec![
                    ("InstanceId".to_owned(), self.instance_id.clone()),
                    ("NamespaceName".to_owned(), name.to_owned()),
                ],
            )
            .await;

        match result {
            Ok(response) if response.code == NAMESPACE_NOT_EXIST_CODE => Ok(false),
            Ok(response) => {
                Self::check_code("GetNamespace", &response.code)?;
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::ResourceNotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn create_namespace(&self, name: &str) -> RegsyncResult<()> {
        let response: CreateNamespaceResponse = self
            .call(
                "CreateNamespace",
                vec![
                    ("InstanceId".to_owned(), self.instance_id.clone()),
                    ("NamespaceName".to_owned(), name.to_owned()),
                    ("AutoCreateRepo".to_owned(), "true".to_owned()),
                    ("DefaultRepoType".to_owned(), "PRIVATE".to_owned()),
                ],
            )
            .await?;
        Self::check_code("CreateNamespace", &response.code)?;

        Ok(())
    }

    async fn get_authorization_token(&self) -> RegsyncResult<SecretString> {
        let response: GetAuthorizationTokenResponse = self
            .call(
                "GetAuthorizationToken",
                vec![("InstanceId".to_owned(), self.instance_id.clone())],
            )
            .await?;

        if !response.code.is_empty() && response.code != SUCCESS_CODE {
            bail!(
                ErrorKind::AuthenticationFailed,
                "failed to obtain an authorization token",
                response.code
            );
        }

        Ok(SecretString::from(response.authorization_token))
    }
}

/// Percent-encodes a string per RFC 3986, leaving unreserved characters
/// untouched, as the canonical query string requires.
fn percent_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());

    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            other => {
                encoded.push_str(&format!("%{other:02X}"));
            }
        }
    }

    encoded
}

/// Error body of a failed API call.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ApiErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ListRepositoryResponse {
    code: String,
    repositories: Vec<RepositoryBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct RepositoryBody {
    repo_id: String,
    repo_name: String,
    repo_namespace_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ListRepoTagResponse {
    code: String,
    images: Vec<TagBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct TagBody {
    tag: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct GetNamespaceResponse {
    code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct CreateNamespaceResponse {
    code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct GetAuthorizationTokenResponse {
    code: String,
    authorization_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_encode_leaves_unreserved_untouched() {
        assert_eq!(percent_encode("abc-DEF_0.9~"), "abc-DEF_0.9~");
    }

    #[test]
    fn test_percent_encode_escapes_reserved_bytes() {
        assert_eq!(percent_encode("a b/c=d"), "a%20b%2Fc%3Dd");
    }

    #[test]
    fn test_response_parsing_is_pascal_case() {
        let raw = r#"{
            "Code": "success",
            "Repositories": [
                {
                    "RepoId": "crr-1",
                    "RepoName": "app",
                    "RepoNamespaceName": "idc"
                }
            ]
        }"#;

        let response: ListRepositoryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.code, "success");
        assert_eq!(response.repositories.len(), 1);
        assert_eq!(response.repositories[0].repo_id, "crr-1");
        assert_eq!(response.repositories[0].repo_namespace_name, "idc");
    }
}
