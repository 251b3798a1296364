//! Chat command front end.
//!
//! Adapts `!verify <username> [token]` and `!help` messages onto the
//! verification service and renders the results as titled replies. The
//! transport delivering messages (chat platform, console) lives elsewhere.

use crate::error::VerifyError;
use crate::service::{Outcome, VerificationRequest, VerificationService};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A recognized command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Verify {
        username: String,
        token: Option<String>,
    },
    Help,
}

/// Command parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    MissingUsername,
}

/// A reply to show the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub title: String,
    pub body: String,
    pub is_error: bool,
}

impl Reply {
    fn ok(title: &str, body: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            body: body.into(),
            is_error: false,
        }
    }

    fn error(body: impl Into<String>) -> Self {
        Self {
            title: "Error running command".to_string(),
            body: body.into(),
            is_error: true,
        }
    }
}

/// Parse a message. Returns `None` for anything that is not one of our
/// commands, so unrelated chatter is ignored.
pub fn parse(prefix: &str, text: &str) -> Option<Result<Command, ParseError>> {
    let rest = text.trim().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?;

    match name.to_ascii_lowercase().as_str() {
        "help" => Some(Ok(Command::Help)),
        "verify" => {
            let Some(username) = words.next() else {
                return Some(Err(ParseError::MissingUsername));
            };
            Some(Ok(Command::Verify {
                username: username.to_string(),
                token: words.next().map(str::to_string),
            }))
        }
        _ => None,
    }
}

/// Dispatches parsed commands to the verification service.
pub struct CommandHandler {
    service: Arc<VerificationService>,
    prefix: String,
    contact: Option<String>,
}

impl CommandHandler {
    pub fn new(
        service: Arc<VerificationService>,
        prefix: impl Into<String>,
        contact: Option<String>,
    ) -> Self {
        Self {
            service,
            prefix: prefix.into(),
            contact,
        }
    }

    /// Handle one message from `requester`. `None` means "not for us".
    pub async fn handle(&self, requester: &str, text: &str) -> Option<Reply> {
        let command = match parse(&self.prefix, text)? {
            Ok(command) => command,
            Err(ParseError::MissingUsername) => {
                return Some(Reply::error(format!(
                    "Please type {}verify, followed by a space, then your username.",
                    self.prefix
                )));
            }
        };
        debug!(requester = %requester, command = ?command, "Command received");

        Some(match command {
            Command::Help => self.help(),
            Command::Verify { username, token } => {
                let request = VerificationRequest {
                    requester: requester.to_string(),
                    username,
                    token,
                };
                match self.service.request_or_validate(&request).await {
                    Ok(outcome) => reply_for_outcome(&outcome),
                    Err(e) => self.reply_for_error(&e),
                }
            }
        })
    }

    fn help(&self) -> Reply {
        let p = &self.prefix;
        let mut body = format!(
            "{p}verify <username> [token]\n\n\
             {p}verify is used to verify your account with your roster username before you are \
             given access. Run {p}verify with your username to request a verification token that \
             will be sent to your email inbox. That email contains the command that completes \
             your verification.\n\n\
             If you are already verified, running {p}verify with your username and token will \
             give you your role again in case you lost it."
        );
        if let Some(ref contact) = self.contact {
            body.push_str(&format!(
                " If you have continued trouble, please contact {contact}."
            ));
        }
        Reply::ok("Email Address Verification", body)
    }

    fn reply_for_error(&self, err: &VerifyError) -> Reply {
        if err.is_protocol() {
            warn!(code = err.error_code(), "Verification refused");
        } else {
            error!(code = err.error_code(), error = %err, "Verification failed");
        }

        let mut body = err.user_message().to_string();
        if let Some(ref contact) = self.contact
            && !matches!(err, VerifyError::InvalidToken)
        {
            body.push_str(&format!(
                " If this keeps happening, please email {contact} with your username."
            ));
        }
        Reply::error(body)
    }
}

/// Render a successful outcome.
pub fn reply_for_outcome(outcome: &Outcome) -> Reply {
    match outcome {
        Outcome::Issued { .. } => Reply::ok(
            "Verification Requested Successfully",
            "Please check your inbox for further instructions.",
        ),
        Outcome::Granted { .. } => Reply::ok(
            "Account Verified Successfully",
            "Contact the admins if you still can't access the server.",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerificationConfig;
    use crate::grant::{LogGranter, RoleMap};
    use crate::notify::{LogNotifier, MessageTemplate};
    use crate::roster::{RosterIndex, RosterRow, StaticRosterSource};
    use crate::store::{MemoryTokenStore, TokenStore};

    #[test]
    fn parses_verify_with_and_without_token() {
        assert_eq!(
            parse("!", "!verify ann"),
            Some(Ok(Command::Verify {
                username: "ann".to_string(),
                token: None
            }))
        );
        assert_eq!(
            parse("!", "  !verify ann abc123  "),
            Some(Ok(Command::Verify {
                username: "ann".to_string(),
                token: Some("abc123".to_string())
            }))
        );
    }

    #[test]
    fn parses_help_and_ignores_other_text() {
        assert_eq!(parse("!", "!help"), Some(Ok(Command::Help)));
        assert_eq!(parse("!", "!HELP"), Some(Ok(Command::Help)));
        assert_eq!(parse("!", "hello there"), None);
        assert_eq!(parse("!", "!dance"), None);
        assert_eq!(parse("!", "!"), None);
        assert_eq!(parse("?", "!verify ann"), None);
    }

    #[test]
    fn verify_without_username_is_an_error() {
        assert_eq!(parse("!", "!verify"), Some(Err(ParseError::MissingUsername)));
    }

    async fn handler() -> (CommandHandler, Arc<MemoryTokenStore>) {
        let roster = RosterIndex::new(Arc::new(StaticRosterSource::new(
            vec![RosterRow::new("ann", "a@x.com")],
            vec![],
        )));
        let store = Arc::new(MemoryTokenStore::new());
        let service = VerificationService::new(
            roster,
            store.clone(),
            Arc::new(LogNotifier::new(MessageTemplate::new("v", "s", "!"))),
            Arc::new(LogGranter::new(RoleMap::new(&Default::default()))),
            VerificationConfig::default(),
        );
        (
            CommandHandler::new(Arc::new(service), "!", Some("help@x.com".to_string())),
            store,
        )
    }

    #[tokio::test]
    async fn full_conversation() {
        let (handler, store) = handler().await;

        let reply = handler.handle("u1", "!verify ann").await.unwrap();
        assert!(!reply.is_error);
        assert_eq!(reply.title, "Verification Requested Successfully");

        let reply = handler.handle("u1", "!verify ann").await.unwrap();
        assert!(reply.is_error);
        assert!(reply.body.contains("already sent"));
        assert!(reply.body.contains("help@x.com"));

        let reply = handler.handle("u1", "!verify ann nope").await.unwrap();
        assert!(reply.is_error);
        assert!(reply.body.contains("Token is incorrect"));

        let token = store.get("ann").await.unwrap().unwrap().token;
        let reply = handler
            .handle("u1", &format!("!verify ann {token}"))
            .await
            .unwrap();
        assert!(!reply.is_error);
        assert_eq!(reply.title, "Account Verified Successfully");
    }

    #[tokio::test]
    async fn unknown_user_and_missing_username_replies() {
        let (handler, _) = handler().await;

        let reply = handler.handle("u1", "!verify bob").await.unwrap();
        assert!(reply.is_error);
        assert!(reply.body.contains("don't appear to have a user"));

        let reply = handler.handle("u1", "!verify").await.unwrap();
        assert!(reply.body.contains("followed by a space"));

        assert!(handler.handle("u1", "good morning").await.is_none());
    }

    #[tokio::test]
    async fn help_mentions_contact() {
        let (handler, _) = handler().await;
        let reply = handler.handle("u1", "!help").await.unwrap();
        assert!(reply.body.starts_with("!verify <username> [token]"));
        assert!(reply.body.contains("help@x.com"));
    }
}
