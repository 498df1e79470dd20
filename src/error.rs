//! Error types for mail2repo.

/// Top-level error type for the bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Subject error: {0}")]
    Subject(#[from] SubjectError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Hosting error: {0}")]
    Hosting(#[from] HostingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Subject-line parsing errors.
///
/// Malformed directive syntax is never an error (it stays in the path
/// text); the only way a subject fails is by having no path left.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubjectError {
    #[error("subject contains no file path after stripping directives")]
    EmptyPath,
}

/// Mailbox collaborator errors. Raised from `list_unseen`, any of
/// these aborts the whole invocation — nothing gets marked seen.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("IMAP connection to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("IMAP login failed for {user}")]
    Auth { user: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Hosting collaborator errors, split by which step of a commit they
/// terminate.
#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    /// Current file/branch state could not be determined.
    #[error("lookup failed for {repo}:{path}@{branch}: {reason}")]
    Lookup {
        repo: String,
        branch: String,
        path: String,
        reason: String,
    },

    /// The create-or-update call was rejected. Includes stale-hash
    /// conflicts, which are never retried.
    #[error("write rejected for {repo}:{path}@{branch}: {reason}")]
    Write {
        repo: String,
        branch: String,
        path: String,
        reason: String,
    },

    /// The target branch was missing and could not be created.
    #[error("branch {branch} unavailable in {repo}: {reason}")]
    Branch {
        repo: String,
        branch: String,
        reason: String,
    },

    /// Tag creation failed after a successful commit. Non-fatal: the
    /// commit stands, the failure is reported alongside it.
    #[error("tag {tag} creation failed in {repo}: {reason}")]
    Tag {
        repo: String,
        tag: String,
        reason: String,
    },
}

/// Result type alias for the bridge.
pub type Result<T> = std::result::Result<T, Error>;
