//! Commit intents — merging parsed directives with configured defaults.

use crate::config::ResolverConfig;
use crate::subject::{DirectiveKey, ParsedSubject};

/// A fully resolved commit, ready to execute against the hosting API.
///
/// Repository, branch and commit message are never empty: absent (or
/// blank) directives fall back to the configured defaults before the
/// intent is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIntent {
    /// Target repository as `owner/name`, used verbatim.
    pub repository: String,
    /// Target branch.
    pub branch: String,
    /// File path inside the repository.
    pub path: String,
    /// File content (the email body).
    pub content: String,
    /// Commit message.
    pub commit_message: String,
    /// Requested author, recorded for auditing. Not forwarded to the
    /// hosting API's commit-author field.
    pub author: Option<String>,
    /// Tag to create at the resulting commit, if requested.
    pub tag: Option<String>,
}

/// Merge a parsed subject with configured defaults into a [`CommitIntent`].
///
/// Pure — no I/O, no failure modes: the parsed subject already carries
/// a non-empty path, and every other field has a default.
pub fn resolve(parsed: &ParsedSubject, body: &str, config: &ResolverConfig) -> CommitIntent {
    CommitIntent {
        repository: directive_or(parsed, DirectiveKey::Repo, &config.default_repo),
        branch: directive_or(parsed, DirectiveKey::Branch, &config.default_branch),
        path: parsed.path.clone(),
        content: body.to_string(),
        commit_message: directive_or(
            parsed,
            DirectiveKey::CommitMsg,
            &config.default_commit_message,
        ),
        author: directive_opt(parsed, DirectiveKey::Author),
        tag: directive_opt(parsed, DirectiveKey::Tag),
    }
}

/// Directive value, falling back to `default` when absent or blank.
fn directive_or(parsed: &ParsedSubject, key: DirectiveKey, default: &str) -> String {
    match parsed.get(key) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

/// Optional directive value; blank counts as absent.
fn directive_opt(parsed: &ParsedSubject, key: DirectiveKey) -> Option<String> {
    parsed.get(key).filter(|v| !v.is_empty()).map(String::from)
}
