use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::fmt::writer::MakeWriterExt;

use mail2repo::config::AppConfig;
use mail2repo::hosting::{GithubClient, HostingClient};
use mail2repo::mailbox::ImapMailbox;
use mail2repo::orchestrator::CommitOrchestrator;
use mail2repo::pump::MailboxPump;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing — stderr plus a log file
    let file_appender = tracing_appender::rolling::never(".", "mail2repo.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(file_writer.and(std::io::stderr))
        .with_ansi(false)
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let senders = &config.mailbox.allowed_senders;
    eprintln!("📬 mail2repo v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   IMAP: {}:{} as {}",
        config.mailbox.imap_host, config.mailbox.imap_port, config.mailbox.username
    );
    eprintln!(
        "   Target: {} (branch {})",
        config.resolver.default_repo, config.resolver.default_branch
    );
    eprintln!(
        "   Senders: {}",
        if senders.iter().any(|s| s == "*") {
            "everyone".to_string()
        } else if senders.is_empty() {
            "none (deny all)".to_string()
        } else {
            senders.join(", ")
        }
    );

    let mailbox = Arc::new(ImapMailbox::new(config.mailbox.clone()));
    let hosting: Arc<dyn HostingClient> = Arc::new(GithubClient::new(&config.hosting)?);
    let orchestrator = CommitOrchestrator::new(hosting, config.resolver.default_branch.clone());
    let pump = MailboxPump::new(
        mailbox,
        orchestrator,
        config.resolver.clone(),
        config.mailbox.allowed_senders.clone(),
    );

    match config.poll_interval_secs {
        // Default: one pass per invocation, scheduling left to cron.
        None => {
            eprintln!("   Mode: single pass\n");
            let report = pump.run_once().await?;
            tracing::info!(
                messages = report.len(),
                committed = report.committed(),
                "Invocation finished"
            );
        }
        Some(secs) => {
            eprintln!("   Mode: polling every {secs}s\n");
            let mut tick = tokio::time::interval(Duration::from_secs(secs));
            loop {
                tick.tick().await;
                if let Err(e) = pump.run_once().await {
                    tracing::error!(error = %e, "Pass aborted");
                }
            }
        }
    }

    Ok(())
}
