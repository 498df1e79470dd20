//! Configuration types, built from environment variables.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Commit message used when the subject carries no `[commit_msg:]`.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Automatically generated change";

/// IMAP mailbox configuration.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub username: String,
    pub password: SecretString,
    /// Senders allowed to trigger commits. Empty list denies all,
    /// `*` allows all, `@domain` / bare `domain` match by domain.
    pub allowed_senders: Vec<String>,
}

impl MailboxConfig {
    /// Build config from environment variables.
    ///
    /// `EMAIL_IMAP_HOST`, `EMAIL_USERNAME` and `EMAIL_PASSWORD` are
    /// required; `EMAIL_IMAP_PORT` defaults to 993.
    pub fn from_env() -> Result<Self, ConfigError> {
        let imap_host = require_env("EMAIL_IMAP_HOST")?;

        let imap_port: u16 = std::env::var("EMAIL_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let username = require_env("EMAIL_USERNAME")?;
        let password = SecretString::from(require_env("EMAIL_PASSWORD")?);

        let allowed_senders: Vec<String> = std::env::var("EMAIL_ALLOWED_SENDERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            imap_host,
            imap_port,
            username,
            password,
            allowed_senders,
        })
    }
}

/// Hosting API configuration.
#[derive(Debug, Clone)]
pub struct HostingConfig {
    pub token: SecretString,
    /// API base URL, overridable for testing against a local stub.
    pub api_base: String,
}

impl HostingConfig {
    /// Build config from environment variables. `GITHUB_TOKEN` is
    /// required; `GITHUB_API_BASE` defaults to the public API.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = SecretString::from(require_env("GITHUB_TOKEN")?);
        let api_base = std::env::var("GITHUB_API_BASE")
            .unwrap_or_else(|_| "https://api.github.com".to_string());

        Ok(Self { token, api_base })
    }
}

/// Defaults applied when a subject omits a directive.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Target repository (`owner/name`) when `[repo:]` is absent.
    pub default_repo: String,
    /// Target branch when `[branch:]` is absent.
    pub default_branch: String,
    /// Commit message when `[commit_msg:]` is absent.
    pub default_commit_message: String,
}

impl ResolverConfig {
    /// Build config from environment variables. `DEFAULT_REPO` is
    /// required and must be `owner/name`; `DEFAULT_BRANCH` defaults
    /// to "main".
    pub fn from_env() -> Result<Self, ConfigError> {
        let default_repo = require_env("DEFAULT_REPO")?;
        validate_repo_slug("DEFAULT_REPO", &default_repo)?;

        let default_branch =
            std::env::var("DEFAULT_BRANCH").unwrap_or_else(|_| "main".to_string());

        Ok(Self {
            default_repo,
            default_branch,
            default_commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
        })
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mailbox: MailboxConfig,
    pub hosting: HostingConfig,
    pub resolver: ResolverConfig,
    /// When set, the pump loops on this interval instead of running a
    /// single pass (the single pass is the cron-invoked default).
    pub poll_interval_secs: Option<u64>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mailbox: MailboxConfig::from_env()?,
            hosting: HostingConfig::from_env()?,
            resolver: ResolverConfig::from_env()?,
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Reject repository values that are not `owner/name`.
fn validate_repo_slug(key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected owner/name, got '{value}'"),
    };
    let (owner, name) = value.split_once('/').ok_or_else(invalid)?;
    if owner.trim().is_empty() || name.trim().is_empty() || name.contains('/') {
        return Err(invalid());
    }
    Ok(())
}
