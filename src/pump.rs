//! Mailbox pump — drives one batch pass over unseen messages.
//!
//! Sequential, one commit intent at a time. Every listed message is
//! marked seen exactly once after its outcome is finalized, whatever
//! that outcome is: a failed message is skipped by later runs, and the
//! external re-run of the whole job is the only retry mechanism.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::ResolverConfig;
use crate::error::{HostingError, MailboxError, SubjectError};
use crate::intent;
use crate::mailbox::{Mailbox, RawMessage, is_sender_allowed};
use crate::orchestrator::{CommitOrchestrator, CommitOutcome};
use crate::subject;

/// Terminal state of one message's processing.
#[derive(Debug)]
pub enum MessageDisposition {
    /// Commit executed (possibly with a non-fatal tag failure).
    Committed(CommitOutcome),
    /// Sender not in the allowlist; nothing executed.
    Blocked,
    /// Subject carried no usable path; nothing executed.
    Rejected(SubjectError),
    /// Hosting lookup or write failed.
    Failed(HostingError),
}

/// Per-message record for reporting.
#[derive(Debug)]
pub struct MessageReport {
    pub uid: String,
    pub message_id: String,
    pub subject: String,
    pub disposition: MessageDisposition,
}

/// Aggregate outcome of one pump pass.
#[derive(Debug, Default)]
pub struct PumpReport {
    pub messages: Vec<MessageReport>,
}

impl PumpReport {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn committed(&self) -> usize {
        self.count(|d| matches!(d, MessageDisposition::Committed(_)))
    }

    pub fn blocked(&self) -> usize {
        self.count(|d| matches!(d, MessageDisposition::Blocked))
    }

    pub fn rejected(&self) -> usize {
        self.count(|d| matches!(d, MessageDisposition::Rejected(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|d| matches!(d, MessageDisposition::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&MessageDisposition) -> bool) -> usize {
        self.messages
            .iter()
            .filter(|m| pred(&m.disposition))
            .count()
    }
}

/// Drives parse → resolve → execute for each unseen message.
pub struct MailboxPump {
    mailbox: Arc<dyn Mailbox>,
    orchestrator: CommitOrchestrator,
    resolver: ResolverConfig,
    allowed_senders: Vec<String>,
}

impl MailboxPump {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        orchestrator: CommitOrchestrator,
        resolver: ResolverConfig,
        allowed_senders: Vec<String>,
    ) -> Self {
        Self {
            mailbox,
            orchestrator,
            resolver,
            allowed_senders,
        }
    }

    /// Process the current batch of unseen messages.
    ///
    /// A `list_unseen` failure aborts the whole invocation with
    /// nothing marked seen. Per-message failures are contained: they
    /// are logged, recorded in the report, and do not stop later
    /// messages.
    pub async fn run_once(&self) -> Result<PumpReport, MailboxError> {
        let messages = self.mailbox.list_unseen().await?;
        if messages.is_empty() {
            return Ok(PumpReport::default());
        }

        info!(count = messages.len(), "Processing unseen messages");

        let mut report = PumpReport::default();
        for message in messages {
            let disposition = self.process(&message).await;

            // Seen flag is the only cross-message state; set it exactly
            // once, after the outcome is final, success or not.
            if let Err(e) = self.mailbox.mark_seen(&message.uid).await {
                warn!(uid = %message.uid, error = %e, "Failed to mark message seen");
            }

            report.messages.push(MessageReport {
                uid: message.uid,
                message_id: message.message_id,
                subject: message.subject,
                disposition,
            });
        }

        info!(
            committed = report.committed(),
            blocked = report.blocked(),
            rejected = report.rejected(),
            failed = report.failed(),
            "Pass complete"
        );
        Ok(report)
    }

    async fn process(&self, message: &RawMessage) -> MessageDisposition {
        if !is_sender_allowed(&self.allowed_senders, &message.sender) {
            warn!(
                message_id = %message.message_id,
                sender = %message.sender,
                "Blocked message from disallowed sender"
            );
            return MessageDisposition::Blocked;
        }

        let parsed = match subject::parse(&message.subject) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(
                    message_id = %message.message_id,
                    subject = %message.subject,
                    error = %e,
                    "Unusable subject"
                );
                return MessageDisposition::Rejected(e);
            }
        };

        let intent = intent::resolve(&parsed, &message.body, &self.resolver);
        match self.orchestrator.execute(&intent).await {
            Ok(outcome) => MessageDisposition::Committed(outcome),
            Err(e) => {
                error!(
                    message_id = %message.message_id,
                    repo = %intent.repository,
                    branch = %intent.branch,
                    path = %intent.path,
                    error = %e,
                    "Commit failed"
                );
                MessageDisposition::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    use crate::hosting::{CommitRef, FileState, FileWrite, HostingClient};

    // ── Fakes ───────────────────────────────────────────────────────

    struct FakeMailbox {
        messages: Vec<RawMessage>,
        fail_list: bool,
        seen: Mutex<Vec<String>>,
    }

    impl FakeMailbox {
        fn with_messages(messages: Vec<RawMessage>) -> Self {
            Self {
                messages,
                fail_list: false,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailbox for FakeMailbox {
        async fn list_unseen(&self) -> Result<Vec<RawMessage>, MailboxError> {
            if self.fail_list {
                return Err(MailboxError::Protocol("unreachable".into()));
            }
            Ok(self.messages.clone())
        }

        async fn mark_seen(&self, uid: &str) -> Result<(), MailboxError> {
            self.seen.lock().unwrap().push(uid.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeHosting {
        fail_write_for_path: Option<String>,
    }

    #[async_trait]
    impl HostingClient for FakeHosting {
        async fn get_file(
            &self,
            _repo: &str,
            _branch: &str,
            _path: &str,
        ) -> Result<Option<FileState>, HostingError> {
            Ok(None)
        }

        async fn put_file(&self, write: FileWrite<'_>) -> Result<CommitRef, HostingError> {
            if self.fail_write_for_path.as_deref() == Some(write.path) {
                return Err(HostingError::Write {
                    repo: write.repo.into(),
                    branch: write.branch.into(),
                    path: write.path.into(),
                    reason: "permission denied".into(),
                });
            }
            Ok(CommitRef { sha: "c0ffee".into() })
        }

        async fn get_branch(
            &self,
            _repo: &str,
            _branch: &str,
        ) -> Result<Option<CommitRef>, HostingError> {
            Ok(Some(CommitRef { sha: "head".into() }))
        }

        async fn create_branch(
            &self,
            _repo: &str,
            _branch: &str,
            _from: &CommitRef,
        ) -> Result<(), HostingError> {
            Ok(())
        }

        async fn create_tag(
            &self,
            _repo: &str,
            _tag: &str,
            _commit: &CommitRef,
        ) -> Result<(), HostingError> {
            Ok(())
        }
    }

    fn message(uid: &str, sender: &str, subject: &str) -> RawMessage {
        RawMessage {
            uid: uid.into(),
            message_id: format!("<{uid}@example.com>"),
            sender: sender.into(),
            subject: subject.into(),
            body: "hello".into(),
            received_at: Utc::now(),
        }
    }

    fn pump(mailbox: Arc<FakeMailbox>, hosting: FakeHosting) -> MailboxPump {
        let orchestrator =
            CommitOrchestrator::new(Arc::new(hosting) as Arc<dyn HostingClient>, "main");
        MailboxPump::new(
            mailbox,
            orchestrator,
            ResolverConfig {
                default_repo: "acme/notes".into(),
                default_branch: "main".into(),
                default_commit_message: "Automatically generated change".into(),
            },
            vec!["@example.com".into()],
        )
    }

    // ── Mark-seen contract ──────────────────────────────────────────

    #[tokio::test]
    async fn every_message_marked_seen_exactly_once() {
        let mailbox = Arc::new(FakeMailbox::with_messages(vec![
            message("1", "alice@example.com", "a.txt"),
            message("2", "mallory@evil.com", "b.txt"),
            message("3", "alice@example.com", "[branch:x] [tag:y]"),
            message("4", "alice@example.com", "fails.txt"),
        ]));
        let hosting = FakeHosting {
            fail_write_for_path: Some("fails.txt".into()),
        };

        let report = pump(Arc::clone(&mailbox), hosting).run_once().await.unwrap();

        assert_eq!(mailbox.seen(), vec!["1", "2", "3", "4"]);
        assert_eq!(report.committed(), 1);
        assert_eq!(report.blocked(), 1);
        assert_eq!(report.rejected(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn mailbox_failure_aborts_with_nothing_marked() {
        let mailbox = Arc::new(FakeMailbox {
            messages: vec![message("1", "alice@example.com", "a.txt")],
            fail_list: true,
            seen: Mutex::new(Vec::new()),
        });

        let result = pump(Arc::clone(&mailbox), FakeHosting::default())
            .run_once()
            .await;

        assert!(result.is_err());
        assert!(mailbox.seen().is_empty());
    }

    // ── Per-message isolation ───────────────────────────────────────

    #[tokio::test]
    async fn failed_message_does_not_stop_later_ones() {
        let mailbox = Arc::new(FakeMailbox::with_messages(vec![
            message("1", "alice@example.com", "fails.txt"),
            message("2", "alice@example.com", "ok.txt"),
        ]));
        let hosting = FakeHosting {
            fail_write_for_path: Some("fails.txt".into()),
        };

        let report = pump(Arc::clone(&mailbox), hosting).run_once().await.unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.committed(), 1);
        assert_eq!(mailbox.seen().len(), 2);
    }

    #[tokio::test]
    async fn empty_mailbox_yields_empty_report() {
        let mailbox = Arc::new(FakeMailbox::with_messages(vec![]));
        let report = pump(mailbox, FakeHosting::default()).run_once().await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn blocked_sender_never_reaches_hosting() {
        // A write failure scripted for the blocked message's path would
        // surface as Failed if the pump executed it.
        let mailbox = Arc::new(FakeMailbox::with_messages(vec![message(
            "1",
            "mallory@evil.com",
            "secret.txt",
        )]));
        let hosting = FakeHosting {
            fail_write_for_path: Some("secret.txt".into()),
        };

        let report = pump(mailbox, hosting).run_once().await.unwrap();

        assert_eq!(report.blocked(), 1);
        assert_eq!(report.failed(), 0);
    }
}
