//! Remote repository storage.
//!
//! [`RemoteStore`] abstracts a content-versioned blob store addressed by
//! path. [`GitHubStore`] implements it on top of the GitHub contents API:
//! every blob carries a revision id (the blob sha) that must be echoed back
//! to update or delete it.
//!
//! Nothing here retries. A write reads the current revision and then
//! writes; a concurrent external write between the two surfaces as
//! [`RemoteError::Conflict`].

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use async_trait::async_trait;
use base64::Engine;
use reqwest::{header, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Repository identity returned by an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoAccess {
    pub repo: String,
    pub default_branch: String,
}

/// A blob read from the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBlob {
    pub content: Vec<u8>,
    pub revision: String,
    pub locator: Option<String>,
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub locator: String,
    pub revision: String,
}

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub size: u64,
    pub locator: Option<String>,
    pub revision: String,
}

/// Content-versioned remote blob store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Verify the credential and repository.
    async fn check_access(&self) -> Result<RepoAccess, RemoteError>;

    /// Read a blob. Fails with `NotFound` when the path does not exist.
    async fn read(&self, path: &str) -> Result<RemoteBlob, RemoteError>;

    /// Create or update a blob, echoing the current revision when one exists.
    async fn write(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<WriteReceipt, RemoteError>;

    /// List dataset blobs in a folder. A missing folder is an empty listing.
    async fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Delete a blob. Fails with `NotFound` when already absent.
    async fn delete(&self, path: &str, message: &str) -> Result<(), RemoteError>;
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    full_name: String,
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    sha: String,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: WrittenContent,
}

#[derive(Debug, Deserialize)]
struct WrittenContent {
    sha: String,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// GitHub contents API client bound to one repository and branch.
pub struct GitHubStore {
    client: reqwest::Client,
    api_url: Url,
    owner: String,
    repo: String,
    branch: String,
    token: String,
    timeout_seconds: u64,
}

impl GitHubStore {
    /// Create a client for the configured repository.
    pub fn new(config: &RemoteConfig, token: &str) -> Result<Self, RemoteError> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| RemoteError::Unreachable(format!("invalid API URL {}: {}", config.api_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("clusterboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Unreachable(format!("failed to create HTTP client: {}", e)))?;

        info!(
            "Remote store: {}/{} on branch {}",
            config.owner, config.repo, config.branch
        );

        Ok(Self {
            client,
            api_url,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token: token.to_string(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    fn repo_url(&self) -> Result<Url, RemoteError> {
        build_url(&self.api_url, &["repos", &self.owner, &self.repo], None)
    }

    fn contents_url(&self, path: &str, with_ref: bool) -> Result<Url, RemoteError> {
        let mut segments = vec!["repos", self.owner.as_str(), self.repo.as_str(), "contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let branch = with_ref.then_some(self.branch.as_str());
        build_url(&self.api_url, &segments, branch)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Send a request and turn non-2xx statuses into typed errors.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<reqwest::Response, RemoteError> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        Err(classify_status(status, message, path))
    }

    fn transport_error(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Unreachable(format!("request timed out after {}s", self.timeout_seconds))
        } else if e.is_connect() {
            RemoteError::Unreachable(format!("cannot connect to {}", self.api_url))
        } else {
            RemoteError::Unreachable(e.to_string())
        }
    }

    /// Fetch raw bytes for blobs too large to be inlined in the JSON response.
    async fn read_raw(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let url = self.contents_url(path, true)?;
        let response = self
            .send(
                self.request(Method::GET, url)
                    .header(header::ACCEPT, "application/vnd.github.raw+json"),
                path,
            )
            .await?;
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(bytes.to_vec())
    }

    fn browse_url(&self, path: &str) -> String {
        format!(
            "https://github.com/{}/{}/blob/{}/{}",
            self.owner, self.repo, self.branch, path
        )
    }
}

#[async_trait]
impl RemoteStore for GitHubStore {
    async fn check_access(&self) -> Result<RepoAccess, RemoteError> {
        let url = self.repo_url()?;
        let name = format!("{}/{}", self.owner, self.repo);
        let response = self
            .send(self.request(Method::GET, url), &name)
            .await
            .map_err(|e| access_error(e, &name))?;
        let repo: RepoResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Unreachable(format!("unexpected repository response: {}", e)))?;

        Ok(RepoAccess {
            repo: repo.full_name,
            default_branch: repo.default_branch,
        })
    }

    async fn read(&self, path: &str) -> Result<RemoteBlob, RemoteError> {
        debug!("Reading remote {}", path);
        let url = self.contents_url(path, true)?;
        let response = self.send(self.request(Method::GET, url), path).await?;
        let file: ContentResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        let inline = file.encoding.as_deref() == Some("base64")
            && (!file.content.is_empty() || file.size == 0);
        let content = if inline {
            decode_content(&file.content)?
        } else {
            self.read_raw(path).await?
        };

        Ok(RemoteBlob {
            content,
            revision: file.sha,
            locator: file.html_url,
        })
    }

    async fn write(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<WriteReceipt, RemoteError> {
        let previous = match self.read(path).await {
            Ok(blob) => Some(blob.revision),
            Err(e) if e.is_not_found() => {
                debug!("Creating new remote file {}", path);
                None
            }
            Err(e) => return Err(e),
        };

        let body = PutRequest {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(content),
            branch: &self.branch,
            sha: previous.as_deref(),
        };

        let url = self.contents_url(path, false)?;
        let response = self
            .send(self.request(Method::PUT, url).json(&body), path)
            .await?;
        let written: WriteResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        let locator = written
            .content
            .html_url
            .unwrap_or_else(|| self.browse_url(path));
        info!("Uploaded {} ({} bytes)", path, content.len());

        Ok(WriteReceipt {
            locator,
            revision: written.content.sha,
        })
    }

    async fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let url = self.contents_url(folder, true)?;
        let response = match self.send(self.request(Method::GET, url), folder).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                debug!("Remote folder {} does not exist yet", folder);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let items: Vec<ListItem> = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        Ok(dataset_entries(items))
    }

    async fn delete(&self, path: &str, message: &str) -> Result<(), RemoteError> {
        let current = self.read(path).await?;

        let body = DeleteRequest {
            message,
            sha: &current.revision,
            branch: &self.branch,
        };
        let url = self.contents_url(path, false)?;
        self.send(self.request(Method::DELETE, url).json(&body), path)
            .await?;

        info!("Deleted remote {}", path);
        Ok(())
    }
}

fn build_url(base: &Url, segments: &[&str], branch: Option<&str>) -> Result<Url, RemoteError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RemoteError::Unreachable(format!("API URL cannot be a base: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    if let Some(branch) = branch {
        url.query_pairs_mut().append_pair("ref", branch);
    }
    Ok(url)
}

/// Map an HTTP failure status onto the remote error taxonomy.
fn classify_status(status: StatusCode, message: String, path: &str) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized {
            status: status.as_u16(),
            message,
        },
        StatusCode::NOT_FOUND => RemoteError::NotFound {
            path: path.to_string(),
        },
        // 409: sha does not match; 422: sha missing for an existing file.
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => RemoteError::Conflict {
            path: path.to_string(),
            message,
        },
        s if s.is_server_error() => {
            RemoteError::Unreachable(format!("server error ({}): {}", s.as_u16(), message))
        }
        _ => RemoteError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Narrow an error from the repository endpoint to the two access failures.
/// GitHub answers 404 for private repositories the token cannot see.
fn access_error(err: RemoteError, repo: &str) -> RemoteError {
    match err {
        RemoteError::Unauthorized { .. } | RemoteError::Unreachable(_) => err,
        RemoteError::NotFound { .. } => RemoteError::Unauthorized {
            status: 404,
            message: format!("repository {} not found or not visible to this token", repo),
        },
        other => RemoteError::Unreachable(other.to_string()),
    }
}

/// Decode base64 content as returned by the contents API (line-wrapped).
fn decode_content(encoded: &str) -> Result<Vec<u8>, RemoteError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Keep only JSON files from a folder listing.
fn dataset_entries(items: Vec<ListItem>) -> Vec<RemoteEntry> {
    items
        .into_iter()
        .filter(|item| item.kind == "file" && item.name.ends_with(".json"))
        .map(|item| RemoteEntry {
            name: item.name,
            size: item.size,
            locator: item.html_url,
            revision: item.sha,
        })
        .collect()
}
