//! The verification state machine.
//!
//! Per-username state is reconstructed from the token store on every call:
//!
//! ```text
//!   Unknown      not on the roster            -> UnknownIdentity
//!   NotIssued    on the roster, no issuance   -> issue + deliver
//!   Issued       on the roster, issuance      -> DuplicateRequest / validate
//!   Verified     Issued + consumed_at         (single-use mode only)
//! ```
//!
//! The service keeps no session state of its own and is safe to restart at
//! any point.

mod delivery;

use crate::config::VerificationConfig;
use crate::error::VerifyError;
use crate::grant::AccessGranter;
use crate::notify::Notifier;
use crate::roster::{Role, RosterIndex};
use crate::store::{StoreError, TokenStore};
use crate::token;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// One inbound verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    /// Host-side identity of the caller; handed to the access granter.
    pub requester: String,
    /// Claimed roster username.
    pub username: String,
    /// Token from a previous issuance, when completing verification.
    pub token: Option<String>,
}

impl VerificationRequest {
    /// Ask for a token to be sent.
    pub fn request(requester: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            requester: requester.into(),
            username: username.into(),
            token: None,
        }
    }

    /// Submit a token received out of band.
    pub fn submit(
        requester: impl Into<String>,
        username: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            requester: requester.into(),
            username: username.into(),
            token: Some(token.into()),
        }
    }

    /// The supplied token; an empty string counts as no token.
    fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Successful result of a verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A token was issued and handed to the notifier.
    Issued { email: String, role: Role },
    /// The token matched and the role was granted.
    Granted { role: Role },
}

/// Orchestrates roster lookup, issuance and validation.
pub struct VerificationService {
    roster: RosterIndex,
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    granter: Arc<dyn AccessGranter>,
    options: VerificationConfig,
}

impl VerificationService {
    pub fn new(
        roster: RosterIndex,
        store: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
        granter: Arc<dyn AccessGranter>,
        options: VerificationConfig,
    ) -> Self {
        Self {
            roster,
            store,
            notifier,
            granter,
            options,
        }
    }

    /// Request a token (no token supplied) or complete verification (token
    /// supplied).
    #[instrument(skip_all, fields(requester = %request.requester, username = %request.username))]
    pub async fn request_or_validate(
        &self,
        request: &VerificationRequest,
    ) -> Result<Outcome, VerifyError> {
        let entry = self
            .bounded("roster lookup", self.roster.resolve(&request.username))
            .await?
            .ok_or_else(|| VerifyError::UnknownIdentity(request.username.clone()))?;

        match request.token() {
            Some(token) => self.complete(request, token, entry.role).await,
            None => self.issue(&request.username, entry.email, entry.role).await,
        }
    }

    async fn complete(
        &self,
        request: &VerificationRequest,
        token: &str,
        role: Role,
    ) -> Result<Outcome, VerifyError> {
        let accepted = if self.options.single_use {
            self.bounded("token consume", self.store.consume(&request.username, token))
                .await?
        } else {
            self.bounded("token validate", self.store.validate(&request.username, token))
                .await?
        };

        if !accepted {
            warn!("Token rejected");
            return Err(VerifyError::InvalidToken);
        }

        self.bounded("role grant", self.granter.grant(&request.requester, role))
            .await?;

        info!(role = %role, "Verification complete");
        Ok(Outcome::Granted { role })
    }

    async fn issue(&self, username: &str, email: String, role: Role) -> Result<Outcome, VerifyError> {
        if self
            .bounded("issuance check", self.store.has_issuance(username))
            .await?
        {
            return Err(VerifyError::DuplicateRequest(username.to_string()));
        }

        let token = token::generate();
        match self
            .bounded("issuance record", self.store.record(username, &token))
            .await
        {
            Ok(_) => {}
            Err(VerifyError::Storage(StoreError::AlreadyIssued(_))) => {
                // Lost a race with a concurrent request for the same username.
                return Err(VerifyError::DuplicateRequest(username.to_string()));
            }
            Err(e) => {
                // The row may have landed before the error or timeout surfaced.
                self.withdraw(username, &token).await;
                return Err(e);
            }
        }

        if let Err(e) = self.deliver_with_retry(&email, &token, username).await {
            self.withdraw(username, &token).await;
            return Err(e);
        }

        info!(role = %role, "Token issued");
        Ok(Outcome::Issued { email, role })
    }

    /// Drop an issuance whose token never reached the user, so they can ask
    /// again instead of being stuck on DuplicateRequest.
    ///
    /// Store failures are retried with the delivery attempt budget; an
    /// issuance that still cannot be removed is logged for an operator.
    async fn withdraw(&self, username: &str, token: &str) {
        let attempts = self.options.delivery_attempts.max(1);
        for attempt in 1..=attempts {
            match self
                .bounded("issuance withdraw", self.store.withdraw(username, token))
                .await
            {
                Ok(true) => {
                    info!("Undelivered token withdrawn");
                    return;
                }
                Ok(false) => {
                    debug!("No issuance left to withdraw");
                    return;
                }
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "Withdraw failed, retrying");
                    tokio::time::sleep(self.options.retry_backoff()).await;
                }
                Err(e) => {
                    error!(attempts, error = %e, "Failed to withdraw undelivered token");
                }
            }
        }
    }

    /// Run a roster/store/grant call under the storage timeout.
    async fn bounded<T, E>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, VerifyError>
    where
        VerifyError: From<E>,
    {
        bounded(self.options.storage_timeout(), op, fut).await
    }
}

async fn bounded<T, E>(
    limit: Duration,
    op: &'static str,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, VerifyError>
where
    VerifyError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(VerifyError::from),
        Err(_) => {
            warn!(op = op, timeout_ms = limit.as_millis() as u64, "Operation timed out");
            Err(VerifyError::Timeout(op))
        }
    }
}
