//! Commit orchestration — turns a resolved intent into the minimal
//! sequence of hosting API calls.
//!
//! Per intent: ensure the target branch exists (creating it from the
//! base branch head if not) → fetch current file state → create or
//! update → optionally tag. The file hash is fetched immediately
//! before the write; a stale hash surfaces as a write rejection and is
//! never retried.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::HostingError;
use crate::hosting::{CommitRef, FileWrite, HostingClient};
use crate::intent::CommitIntent;

/// Whether the write created a new file or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Created,
    Updated,
}

/// What actually happened for one intent, including partial success.
#[derive(Debug)]
pub struct CommitOutcome {
    pub repository: String,
    pub branch: String,
    pub path: String,
    pub action: FileAction,
    pub commit: CommitRef,
    /// True when a requested tag was created.
    pub tag_created: bool,
    /// Set when a requested tag failed after a successful commit. The
    /// commit stands.
    pub tag_error: Option<HostingError>,
}

/// Executes commit intents against the hosting collaborator.
pub struct CommitOrchestrator {
    hosting: Arc<dyn HostingClient>,
    /// Branch whose head seeds newly created target branches.
    base_branch: String,
}

impl CommitOrchestrator {
    pub fn new(hosting: Arc<dyn HostingClient>, base_branch: impl Into<String>) -> Self {
        Self {
            hosting,
            base_branch: base_branch.into(),
        }
    }

    /// Run one intent to completion. Lookup and write failures are
    /// terminal; a tag failure is reported in the outcome instead.
    pub async fn execute(&self, intent: &CommitIntent) -> Result<CommitOutcome, HostingError> {
        let repo = intent.repository.as_str();
        let branch = intent.branch.as_str();

        self.ensure_branch(repo, branch).await?;

        let existing = self.hosting.get_file(repo, branch, &intent.path).await?;
        let action = match existing {
            Some(_) => FileAction::Updated,
            None => FileAction::Created,
        };

        let commit = self
            .hosting
            .put_file(FileWrite {
                repo,
                branch,
                path: &intent.path,
                content: &intent.content,
                message: &intent.commit_message,
                author: intent.author.as_deref(),
                prior_hash: existing.as_ref().map(|f| f.content_hash.as_str()),
            })
            .await?;

        info!(
            repo,
            branch,
            path = %intent.path,
            commit = %commit.sha,
            ?action,
            "File committed"
        );

        let (tag_created, tag_error) = match &intent.tag {
            None => (false, None),
            Some(tag) => match self.hosting.create_tag(repo, tag, &commit).await {
                Ok(()) => {
                    info!(repo, tag = %tag, commit = %commit.sha, "Tag created");
                    (true, None)
                }
                Err(e) => {
                    // The commit stands; the tag failure rides along.
                    warn!(repo, tag = %tag, error = %e, "Tag creation failed after commit");
                    (false, Some(e))
                }
            },
        };

        Ok(CommitOutcome {
            repository: intent.repository.clone(),
            branch: intent.branch.clone(),
            path: intent.path.clone(),
            action,
            commit,
            tag_created,
            tag_error,
        })
    }

    /// Create the target branch from the base branch head when absent.
    async fn ensure_branch(&self, repo: &str, branch: &str) -> Result<(), HostingError> {
        if self.hosting.get_branch(repo, branch).await?.is_some() {
            return Ok(());
        }

        let base = self
            .hosting
            .get_branch(repo, &self.base_branch)
            .await?
            .ok_or_else(|| HostingError::Branch {
                repo: repo.to_string(),
                branch: branch.to_string(),
                reason: format!("base branch {} not found", self.base_branch),
            })?;

        self.hosting.create_branch(repo, branch, &base).await?;
        info!(repo, branch, from = %self.base_branch, "Branch created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::hosting::FileState;

    /// Scriptable hosting fake recording every call.
    #[derive(Default)]
    struct FakeHosting {
        existing_file: Option<FileState>,
        missing_branches: Vec<String>,
        fail_write: bool,
        fail_tag: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeHosting {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl HostingClient for FakeHosting {
        async fn get_file(
            &self,
            _repo: &str,
            _branch: &str,
            path: &str,
        ) -> Result<Option<FileState>, HostingError> {
            self.record(format!("get_file {path}"));
            Ok(self.existing_file.clone())
        }

        async fn put_file(&self, write: FileWrite<'_>) -> Result<CommitRef, HostingError> {
            self.record(format!(
                "put_file {} hash={:?}",
                write.path, write.prior_hash
            ));
            if self.fail_write {
                return Err(HostingError::Write {
                    repo: write.repo.into(),
                    branch: write.branch.into(),
                    path: write.path.into(),
                    reason: "409 (stale content hash?)".into(),
                });
            }
            Ok(CommitRef { sha: "c0ffee".into() })
        }

        async fn get_branch(
            &self,
            _repo: &str,
            branch: &str,
        ) -> Result<Option<CommitRef>, HostingError> {
            self.record(format!("get_branch {branch}"));
            if self.missing_branches.iter().any(|b| b == branch) {
                Ok(None)
            } else {
                Ok(Some(CommitRef { sha: "head".into() }))
            }
        }

        async fn create_branch(
            &self,
            _repo: &str,
            branch: &str,
            from: &CommitRef,
        ) -> Result<(), HostingError> {
            self.record(format!("create_branch {branch} from {}", from.sha));
            Ok(())
        }

        async fn create_tag(
            &self,
            repo: &str,
            tag: &str,
            commit: &CommitRef,
        ) -> Result<(), HostingError> {
            self.record(format!("create_tag {tag} at {}", commit.sha));
            if self.fail_tag {
                return Err(HostingError::Tag {
                    repo: repo.into(),
                    tag: tag.into(),
                    reason: "boom".into(),
                });
            }
            Ok(())
        }
    }

    fn intent(tag: Option<&str>) -> CommitIntent {
        CommitIntent {
            repository: "acme/notes".into(),
            branch: "main".into(),
            path: "file.txt".into(),
            content: "hello".into(),
            commit_message: "Automatically generated change".into(),
            author: None,
            tag: tag.map(String::from),
        }
    }

    fn orchestrator(fake: FakeHosting) -> (Arc<FakeHosting>, CommitOrchestrator) {
        let fake = Arc::new(fake);
        let orch = CommitOrchestrator::new(Arc::clone(&fake) as Arc<dyn HostingClient>, "main");
        (fake, orch)
    }

    // ── Create vs update ────────────────────────────────────────────

    #[tokio::test]
    async fn missing_file_is_created_without_hash() {
        let (fake, orch) = orchestrator(FakeHosting::default());

        let outcome = orch.execute(&intent(None)).await.unwrap();

        assert_eq!(outcome.action, FileAction::Created);
        assert_eq!(outcome.commit.sha, "c0ffee");
        assert!(fake.calls().contains(&"put_file file.txt hash=None".to_string()));
    }

    #[tokio::test]
    async fn existing_file_is_updated_with_fresh_hash() {
        let (fake, orch) = orchestrator(FakeHosting {
            existing_file: Some(FileState {
                content_hash: "abc123".into(),
            }),
            ..Default::default()
        });

        let outcome = orch.execute(&intent(None)).await.unwrap();

        assert_eq!(outcome.action, FileAction::Updated);
        assert!(
            fake.calls()
                .contains(&r#"put_file file.txt hash=Some("abc123")"#.to_string())
        );
    }

    #[tokio::test]
    async fn write_rejection_is_terminal() {
        let (_fake, orch) = orchestrator(FakeHosting {
            fail_write: true,
            ..Default::default()
        });

        let err = orch.execute(&intent(None)).await.unwrap_err();
        assert!(matches!(err, HostingError::Write { .. }));
    }

    // ── Tags ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn requested_tag_is_created_at_commit() {
        let (fake, orch) = orchestrator(FakeHosting::default());

        let outcome = orch.execute(&intent(Some("v1.0"))).await.unwrap();

        assert!(outcome.tag_created);
        assert!(outcome.tag_error.is_none());
        assert!(fake.calls().contains(&"create_tag v1.0 at c0ffee".to_string()));
    }

    #[tokio::test]
    async fn tag_failure_does_not_void_commit() {
        let (_fake, orch) = orchestrator(FakeHosting {
            fail_tag: true,
            ..Default::default()
        });

        let outcome = orch.execute(&intent(Some("v1.0"))).await.unwrap();

        assert_eq!(outcome.action, FileAction::Created);
        assert_eq!(outcome.commit.sha, "c0ffee");
        assert!(!outcome.tag_created);
        assert!(matches!(outcome.tag_error, Some(HostingError::Tag { .. })));
    }

    #[tokio::test]
    async fn no_tag_requested_no_tag_call() {
        let (fake, orch) = orchestrator(FakeHosting::default());

        let outcome = orch.execute(&intent(None)).await.unwrap();

        assert!(!outcome.tag_created);
        assert!(!fake.calls().iter().any(|c| c.starts_with("create_tag")));
    }

    // ── Branch handling ─────────────────────────────────────────────

    #[tokio::test]
    async fn missing_branch_is_created_from_base() {
        let (fake, orch) = orchestrator(FakeHosting {
            missing_branches: vec!["feature/x".into()],
            ..Default::default()
        });

        let mut i = intent(None);
        i.branch = "feature/x".into();
        orch.execute(&i).await.unwrap();

        assert!(
            fake.calls()
                .contains(&"create_branch feature/x from head".to_string())
        );
    }

    #[tokio::test]
    async fn existing_branch_is_not_recreated() {
        let (fake, orch) = orchestrator(FakeHosting::default());

        orch.execute(&intent(None)).await.unwrap();

        assert!(!fake.calls().iter().any(|c| c.starts_with("create_branch")));
    }

    #[tokio::test]
    async fn missing_base_branch_is_terminal() {
        let (_fake, orch) = orchestrator(FakeHosting {
            missing_branches: vec!["feature/x".into(), "main".into()],
            ..Default::default()
        });

        let mut i = intent(None);
        i.branch = "feature/x".into();
        let err = orch.execute(&i).await.unwrap_err();
        assert!(matches!(err, HostingError::Branch { .. }));
    }
}
