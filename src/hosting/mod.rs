//! Hosting API abstraction — file reads/writes and ref creation in a
//! remote repository.

pub mod github;

use async_trait::async_trait;

use crate::error::HostingError;

pub use github::GithubClient;

/// Current state of a file in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileState {
    /// Content hash the hosting API requires to authorize an update.
    pub content_hash: String,
}

/// Reference to a commit produced by a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
    pub sha: String,
}

/// A create-or-update request against the contents endpoint.
///
/// `prior_hash` must be the hash fetched immediately before the write:
/// a stale hash is rejected by the API rather than silently
/// overwriting concurrent changes.
#[derive(Debug, Clone)]
pub struct FileWrite<'a> {
    pub repo: &'a str,
    pub branch: &'a str,
    pub path: &'a str,
    pub content: &'a str,
    pub message: &'a str,
    /// Requested author. Recorded for auditing only; implementations
    /// do not map it to the commit-author field.
    pub author: Option<&'a str>,
    /// Present for updates, absent for creates.
    pub prior_hash: Option<&'a str>,
}

/// Repository hosting collaborator.
#[async_trait]
pub trait HostingClient: Send + Sync {
    /// Current file metadata at `(repo, branch, path)`, or `None` if
    /// the file does not exist.
    async fn get_file(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<Option<FileState>, HostingError>;

    /// Create or update a file, producing a commit.
    async fn put_file(&self, write: FileWrite<'_>) -> Result<CommitRef, HostingError>;

    /// Head commit of a branch, or `None` if the branch does not exist.
    async fn get_branch(
        &self,
        repo: &str,
        branch: &str,
    ) -> Result<Option<CommitRef>, HostingError>;

    /// Create a branch pointing at `from`.
    async fn create_branch(
        &self,
        repo: &str,
        branch: &str,
        from: &CommitRef,
    ) -> Result<(), HostingError>;

    /// Create a tag ref pointing at `commit`.
    async fn create_tag(
        &self,
        repo: &str,
        tag: &str,
        commit: &CommitRef,
    ) -> Result<(), HostingError>;
}
