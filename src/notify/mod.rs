//! Out-of-band token delivery.
//!
//! The verification core only needs "deliver this token to this address".
//! Backends:
//! - [`LogNotifier`]: writes the message to the log (development)
//! - [`WebhookNotifier`]: POSTs the message to an HTTP mail relay

mod webhook;

pub use webhook::WebhookNotifier;

use crate::config::{Config, NotifierKind};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Delivery errors. All of them are transient from the requester's view.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay rejected message with status {0}")]
    Rejected(u16),
    #[error("notifier misconfigured: {0}")]
    Misconfigured(String),
}

/// Delivers a verification token to an email address.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, to: &str, token: &str, username: &str) -> Result<(), NotifyError>;
}

/// A rendered verification message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationMessage {
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// Builds the message text around a token.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    from: String,
    subject: String,
    command_prefix: String,
}

impl MessageTemplate {
    pub fn new(
        from: impl Into<String>,
        subject: impl Into<String>,
        command_prefix: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            subject: subject.into(),
            command_prefix: command_prefix.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.notifier.from,
            &config.notifier.subject,
            &config.verification.command_prefix,
        )
    }

    /// The command the recipient sends back to complete verification.
    pub fn reply_command(&self, username: &str, token: &str) -> String {
        format!("{}verify {} {}", self.command_prefix, username, token)
    }

    pub fn render(&self, username: &str, token: &str) -> VerificationMessage {
        let body = format!(
            "Hello!\n\n\
             To verify your email address, please send the following command to the bot:\n\n\
             \x20   {}\n\n\
             If you didn't request this verification, please ignore this email.\n",
            self.reply_command(username, token)
        );
        VerificationMessage {
            from: self.from.clone(),
            subject: self.subject.clone(),
            body,
        }
    }
}

/// Notifier that only logs. Tokens end up in the log, so never use it in
/// production.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    template: MessageTemplate,
}

impl LogNotifier {
    pub fn new(template: MessageTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, to: &str, token: &str, username: &str) -> Result<(), NotifyError> {
        let message = self.template.render(username, token);
        info!(
            to = %to,
            username = %username,
            subject = %message.subject,
            body = %message.body,
            "Verification message (log notifier)"
        );
        Ok(())
    }
}

/// Build the notifier selected by the configuration.
pub fn from_config(config: &Config) -> Result<Arc<dyn Notifier>, NotifyError> {
    let template = MessageTemplate::from_config(config);
    match config.notifier.kind {
        NotifierKind::Log => {
            tracing::warn!("Using log notifier - tokens will be written to the log");
            Ok(Arc::new(LogNotifier::new(template)))
        }
        NotifierKind::Webhook => {
            let url = config.notifier.url.clone().ok_or_else(|| {
                NotifyError::Misconfigured("notifier.url is required".to_string())
            })?;
            let notifier = WebhookNotifier::new(
                url,
                config.notifier.auth_token.clone(),
                template,
                config.verification.delivery_timeout(),
            )?;
            Ok(Arc::new(notifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_embeds_reply_command() {
        let template = MessageTemplate::new("Verifier <v@x.com>", "Verify", "!");
        let message = template.render("ann", "abc123");
        assert_eq!(message.from, "Verifier <v@x.com>");
        assert_eq!(message.subject, "Verify");
        assert!(message.body.contains("    !verify ann abc123\n"));
        assert!(message.body.contains("please ignore this email"));
    }

    #[test]
    fn reply_command_uses_prefix() {
        let template = MessageTemplate::new("a", "b", "?");
        assert_eq!(template.reply_command("ann", "t"), "?verify ann t");
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier::new(MessageTemplate::new("a", "b", "!"));
        assert!(notifier.deliver("a@x.com", "t", "ann").await.is_ok());
    }

    #[test]
    fn webhook_without_url_is_misconfigured() {
        let config: Config = toml::from_str(
            "[roster]\nstudents = \"s.csv\"\nteachers = \"t.csv\"\n[notifier]\nkind = \"webhook\"\n",
        )
        .unwrap();
        assert!(matches!(
            from_config(&config),
            Err(NotifyError::Misconfigured(_))
        ));
    }
}
