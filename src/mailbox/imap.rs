//! IMAP mailbox — raw IMAP over rustls, driven on a blocking stream.
//!
//! Each call opens a short-lived session: connect → LOGIN → SELECT
//! INBOX → command(s) → LOGOUT. Fetching does NOT flag messages; the
//! pump calls [`Mailbox::mark_seen`] once per message after its
//! outcome is finalized.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mail_parser::MessageParser;
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::config::MailboxConfig;
use crate::error::MailboxError;
use crate::mailbox::{Mailbox, RawMessage};

/// IMAP-backed [`Mailbox`]. Blocking socket I/O runs inside
/// `spawn_blocking`.
pub struct ImapMailbox {
    config: MailboxConfig,
}

impl ImapMailbox {
    pub fn new(config: MailboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn list_unseen(&self) -> Result<Vec<RawMessage>, MailboxError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_unseen(&config))
            .await
            .map_err(|e| MailboxError::Protocol(format!("fetch task panicked: {e}")))?
    }

    async fn mark_seen(&self, uid: &str) -> Result<(), MailboxError> {
        let config = self.config.clone();
        let uid = uid.to_string();
        tokio::task::spawn_blocking(move || {
            let mut session = ImapSession::connect(&config)?;
            session.store_seen(&uid)?;
            session.logout();
            Ok(())
        })
        .await
        .map_err(|e| MailboxError::Protocol(format!("mark-seen task panicked: {e}")))?
    }
}

/// Fetch all unseen messages (blocking).
fn fetch_unseen(config: &MailboxConfig) -> Result<Vec<RawMessage>, MailboxError> {
    let mut session = ImapSession::connect(config)?;
    let uids = session.search_unseen()?;

    let mut messages = Vec::with_capacity(uids.len());
    for uid in uids {
        let raw = session.fetch_rfc822(&uid)?;
        let Some(parsed) = MessageParser::default().parse(raw.as_bytes()) else {
            tracing::warn!(uid = %uid, "Unparseable message skipped");
            continue;
        };

        let sender = parsed
            .from()
            .and_then(|addr| addr.first())
            .and_then(|a| a.address())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".into());

        let subject = parsed.subject().unwrap_or_default().to_string();
        let body = extract_text(&parsed);

        let message_id = parsed
            .message_id()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));

        let received_at = parsed
            .date()
            .and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0))
            .unwrap_or_else(Utc::now);

        messages.push(RawMessage {
            uid,
            message_id,
            sender,
            subject,
            body,
            received_at,
        });
    }

    session.logout();
    Ok(messages)
}

/// Extract readable text from a parsed email: plain-text part
/// preferred, HTML part with tags stripped as fallback.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Blocking IMAP session ───────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

struct ImapSession {
    tls: TlsStream,
    tag_counter: u32,
}

impl ImapSession {
    /// Connect, establish TLS, and LOGIN.
    fn connect(config: &MailboxConfig) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((&*config.imap_host, config.imap_port)).map_err(|e| {
            MailboxError::Connect {
                host: config.imap_host.clone(),
                port: config.imap_port,
                reason: e.to_string(),
            }
        })?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))
            .map_err(|e| MailboxError::Protocol(e.to_string()))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name: rustls::pki_types::ServerName<'_> =
            rustls::pki_types::ServerName::try_from(config.imap_host.clone())
                .map_err(|e| MailboxError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailboxError::Tls(e.to_string()))?;

        let mut session = Self {
            tls: rustls::StreamOwned::new(conn, tcp),
            tag_counter: 0,
        };

        // Server greeting precedes the first command.
        session.read_line()?;

        let login = session.send_cmd(&format!(
            "LOGIN \"{}\" \"{}\"",
            config.username,
            config.password.expose_secret()
        ))?;
        if !login.last().is_some_and(|l| l.contains("OK")) {
            return Err(MailboxError::Auth {
                user: config.username.clone(),
            });
        }

        session.send_cmd("SELECT \"INBOX\"")?;
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.tls.read(&mut byte) {
                Ok(0) => return Err(MailboxError::Protocol("connection closed".into())),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(MailboxError::Protocol(e.to_string())),
            }
        }
    }

    /// Send a tagged command and collect lines until the tagged reply.
    fn send_cmd(&mut self, cmd: &str) -> Result<Vec<String>, MailboxError> {
        self.tag_counter += 1;
        let tag = format!("A{}", self.tag_counter);
        let full = format!("{tag} {cmd}\r\n");
        self.tls
            .write_all(full.as_bytes())
            .and_then(|()| self.tls.flush())
            .map_err(|e| MailboxError::Protocol(e.to_string()))?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }

    /// UID SEARCH UNSEEN → message UIDs. Mark-seen runs in a later
    /// session than the fetch, so sequence numbers would go stale;
    /// UIDs don't.
    fn search_unseen(&mut self) -> Result<Vec<String>, MailboxError> {
        let resp = self.send_cmd("UID SEARCH UNSEEN")?;
        let mut uids = Vec::new();
        for line in &resp {
            if line.starts_with("* SEARCH") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() > 2 {
                    uids.extend(parts[2..].iter().map(|s| s.to_string()));
                }
            }
        }
        Ok(uids)
    }

    /// FETCH one message's full RFC822 text.
    fn fetch_rfc822(&mut self, uid: &str) -> Result<String, MailboxError> {
        let resp = self.send_cmd(&format!("UID FETCH {uid} RFC822"))?;
        // First line is the untagged FETCH header, last two are the
        // closing paren and the tagged reply.
        Ok(resp
            .iter()
            .skip(1)
            .take(resp.len().saturating_sub(2))
            .cloned()
            .collect())
    }

    fn store_seen(&mut self, uid: &str) -> Result<(), MailboxError> {
        self.send_cmd(&format!("UID STORE {uid} +FLAGS (\\Seen)"))?;
        Ok(())
    }

    fn logout(&mut self) {
        let _ = self.send_cmd("LOGOUT");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── HTML stripping tests ────────────────────────────────────────

    #[test]
    fn strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
    }

    #[test]
    fn strip_html_nested_tags() {
        assert_eq!(
            strip_html("<div><b>Bold</b> and <i>italic</i></div>"),
            "Bold and italic"
        );
    }

    #[test]
    fn strip_html_with_attributes() {
        assert_eq!(
            strip_html(r#"<a href="https://example.com">Link</a>"#),
            "Link"
        );
    }

    #[test]
    fn strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("No HTML here"), "No HTML here");
    }

    #[test]
    fn strip_html_empty() {
        assert_eq!(strip_html(""), "");
    }
}
