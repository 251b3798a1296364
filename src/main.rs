//! admitd console host.
//!
//! Reads `<requester> <message>` lines from stdin, runs chat commands
//! through the verification service and prints the replies.

use admitd::commands::{CommandHandler, Reply};
use admitd::config::{self, Config};
use admitd::db::Database;
use admitd::grant::{LogGranter, RoleMap};
use admitd::notify;
use admitd::roster::{CsvRosterSource, RosterIndex};
use admitd::service::VerificationService;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries replies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        students = %config.roster.students,
        teachers = %config.roster.teachers,
        single_use = config.verification.single_use,
        "Starting admitd"
    );

    let db = Database::new(&config.database.path).await?;

    let service = VerificationService::new(
        RosterIndex::new(Arc::new(CsvRosterSource::from_config(&config.roster))),
        Arc::new(db.issuances()),
        notify::from_config(&config)?,
        Arc::new(LogGranter::new(RoleMap::new(&config.roles))),
        config.verification.clone(),
    );

    let handler = CommandHandler::new(
        Arc::new(service),
        config.verification.command_prefix.clone(),
        config.notifier.contact.clone(),
    );

    run_console(&handler).await?;

    db.pool().close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn run_console(handler: &CommandHandler) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        };
        let Some(line) = line else {
            return Ok(());
        };

        let Some((requester, message)) = line.trim().split_once(char::is_whitespace) else {
            if !line.trim().is_empty() {
                warn!(line = %line, "Expected '<requester> <message>'");
            }
            continue;
        };

        if let Some(reply) = handler.handle(requester, message).await {
            stdout.write_all(render(requester, &reply).as_bytes()).await?;
            stdout.flush().await?;
        }
    }
}

fn render(requester: &str, reply: &Reply) -> String {
    let marker = if reply.is_error { "ERR" } else { "OK" };
    format!("{requester} {marker} [{}] {}\n", reply.title, reply.body)
}
