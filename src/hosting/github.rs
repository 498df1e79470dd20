//! GitHub REST implementation of the hosting collaborator.
//!
//! Uses the contents endpoint for file reads/writes and the git-refs
//! endpoint for branches and tags. The API base is configurable so
//! tests can point at a local stub.

use async_trait::async_trait;
use base64::Engine;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::HostingConfig;
use crate::error::{ConfigError, HostingError};
use crate::hosting::{CommitRef, FileState, FileWrite, HostingClient};

/// GitHub REST v3 client.
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GithubClient {
    pub fn new(config: &HostingConfig) -> Result<Self, ConfigError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("mail2repo"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth = format!("Bearer {}", config.token.expose_secret().trim());
        let mut auth = reqwest::header::HeaderValue::from_str(&auth).map_err(|e| {
            ConfigError::InvalidValue {
                key: "GITHUB_TOKEN".into(),
                message: e.to_string(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "GITHUB_API_BASE".into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn contents_url(&self, repo: &str, path: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.api_base, repo, path)
    }
}

#[async_trait]
impl HostingClient for GithubClient {
    async fn get_file(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<Option<FileState>, HostingError> {
        let lookup_err = |reason: String| HostingError::Lookup {
            repo: repo.to_string(),
            branch: branch.to_string(),
            path: path.to_string(),
            reason,
        };

        let response = self
            .http
            .get(self.contents_url(repo, path))
            .query(&[("ref", branch)])
            .send()
            .await
            .map_err(|e| lookup_err(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let contents: ContentsResponse =
                    response.json().await.map_err(|e| lookup_err(e.to_string()))?;
                Ok(Some(FileState {
                    content_hash: contents.sha,
                }))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(lookup_err(format!("{status}: {}", excerpt(&body))))
            }
        }
    }

    async fn put_file(&self, write: FileWrite<'_>) -> Result<CommitRef, HostingError> {
        let write_err = |reason: String| HostingError::Write {
            repo: write.repo.to_string(),
            branch: write.branch.to_string(),
            path: write.path.to_string(),
            reason,
        };

        if let Some(author) = write.author {
            // Audit trail only; the commit is authored by the token.
            tracing::info!(author, path = write.path, "Author directive recorded");
        }

        let payload = PutPayload {
            message: write.message,
            content: base64::engine::general_purpose::STANDARD.encode(write.content),
            branch: write.branch,
            sha: write.prior_hash,
        };

        let response = self
            .http
            .put(self.contents_url(write.repo, write.path))
            .json(&payload)
            .send()
            .await
            .map_err(|e| write_err(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let put: PutResponse = response.json().await.map_err(|e| write_err(e.to_string()))?;
            Ok(CommitRef {
                sha: put.commit.sha,
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            let reason = if status == reqwest::StatusCode::CONFLICT
                || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
            {
                format!("{status} (stale content hash?): {}", excerpt(&body))
            } else {
                format!("{status}: {}", excerpt(&body))
            };
            Err(write_err(reason))
        }
    }

    async fn get_branch(
        &self,
        repo: &str,
        branch: &str,
    ) -> Result<Option<CommitRef>, HostingError> {
        let branch_err = |reason: String| HostingError::Branch {
            repo: repo.to_string(),
            branch: branch.to_string(),
            reason,
        };

        let url = format!("{}/repos/{}/branches/{}", self.api_base, repo, branch);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| branch_err(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let info: BranchResponse =
                    response.json().await.map_err(|e| branch_err(e.to_string()))?;
                Ok(Some(CommitRef {
                    sha: info.commit.sha,
                }))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(branch_err(format!("{status}: {}", excerpt(&body))))
            }
        }
    }

    async fn create_branch(
        &self,
        repo: &str,
        branch: &str,
        from: &CommitRef,
    ) -> Result<(), HostingError> {
        self.create_ref(repo, &format!("refs/heads/{branch}"), &from.sha)
            .await
            .map_err(|reason| HostingError::Branch {
                repo: repo.to_string(),
                branch: branch.to_string(),
                reason,
            })
    }

    async fn create_tag(
        &self,
        repo: &str,
        tag: &str,
        commit: &CommitRef,
    ) -> Result<(), HostingError> {
        self.create_ref(repo, &format!("refs/tags/{tag}"), &commit.sha)
            .await
            .map_err(|reason| HostingError::Tag {
                repo: repo.to_string(),
                tag: tag.to_string(),
                reason,
            })
    }
}

impl GithubClient {
    /// POST a new git ref. Shared by branch and tag creation.
    async fn create_ref(&self, repo: &str, git_ref: &str, sha: &str) -> Result<(), String> {
        let url = format!("{}/repos/{}/git/refs", self.api_base, repo);
        let response = self
            .http
            .post(url)
            .json(&RefPayload { git_ref, sha })
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(format!("{status}: {}", excerpt(&body)))
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PutPayload<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RefPayload<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    sha: &'a str,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    commit: CommitInfo,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: CommitInfo,
}

/// Trim an API error body for log-sized error messages.
fn excerpt(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut cut = MAX;
        while !trimmed.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &trimmed[..cut])
    }
}
