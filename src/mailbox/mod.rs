//! Mailbox abstraction — lists unseen messages, marks them seen.

pub mod imap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MailboxError;

pub use imap::ImapMailbox;

/// One unseen email, scoped to a single processing attempt.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Mailbox-native handle used to mark the message seen (IMAP UID).
    pub uid: String,
    /// RFC 5322 Message-ID, or a generated fallback.
    pub message_id: String,
    /// Sender address.
    pub sender: String,
    /// Subject line (directives + path).
    pub subject: String,
    /// Body text — the file content to commit.
    pub body: String,
    /// When the message was sent.
    pub received_at: DateTime<Utc>,
}

/// Mail-retrieval collaborator.
///
/// `list_unseen` returns a finite snapshot of currently-unseen
/// messages; re-running the job only sees messages not yet marked.
#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn list_unseen(&self) -> Result<Vec<RawMessage>, MailboxError>;

    /// Flag a message so later invocations skip it. Called exactly
    /// once per message, after its outcome is finalized.
    async fn mark_seen(&self, uid: &str) -> Result<(), MailboxError>;
}

/// Check if a sender email is in the allowlist.
///
/// - Empty list → deny all
/// - `*` in list → allow all
/// - `@domain.com` or `domain.com` → domain match
/// - `user@domain.com` → exact email match
pub fn is_sender_allowed(allowed: &[String], email: &str) -> bool {
    if allowed.is_empty() {
        return false;
    }
    if allowed.iter().any(|a| a == "*") {
        return true;
    }
    let email_lower = email.to_lowercase();
    allowed.iter().any(|a| {
        if a.starts_with('@') {
            // "@example.com" → domain match
            email_lower.ends_with(&a.to_lowercase())
        } else if a.contains('@') {
            // "user@example.com" → exact email match
            a.eq_ignore_ascii_case(email)
        } else {
            // "example.com" → domain match
            email_lower.ends_with(&format!("@{}", a.to_lowercase()))
        }
    })
}
