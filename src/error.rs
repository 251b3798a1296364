//! Unified error handling for the verification flow.
//!
//! Errors fall into two classes:
//! - protocol errors the requester can fix themselves (wrong username,
//!   wrong token, asking twice)
//! - infrastructure errors that are not the requester's fault and may
//!   succeed on a later attempt

use crate::grant::GrantError;
use crate::notify::NotifyError;
use crate::roster::RosterError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors returned by [`crate::service::VerificationService`].
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("no roster entry for username {0}")]
    UnknownIdentity(String),

    #[error("a token was already sent for username {0}")]
    DuplicateRequest(String),

    #[error("token does not match")]
    InvalidToken,

    #[error("roster unavailable: {0}")]
    Roster(#[from] RosterError),

    #[error("token storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("delivery failed: {0}")]
    Delivery(#[from] NotifyError),

    #[error("role grant failed: {0}")]
    Grant(#[from] GrantError),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

impl VerifyError {
    /// Whether the requester caused this and can correct it.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::UnknownIdentity(_) | Self::DuplicateRequest(_) | Self::InvalidToken
        )
    }

    /// Whether retrying the same request later may succeed.
    ///
    /// A malformed roster needs an operator, so it is neither protocol nor
    /// transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(_) | Self::Delivery(_) | Self::Grant(_) | Self::Timeout(_) => true,
            Self::Roster(RosterError::Io { .. }) => true,
            Self::Roster(_) => false,
            Self::UnknownIdentity(_) | Self::DuplicateRequest(_) | Self::InvalidToken => false,
        }
    }

    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownIdentity(_) => "unknown_identity",
            Self::DuplicateRequest(_) => "duplicate_request",
            Self::InvalidToken => "invalid_token",
            Self::Roster(_) => "roster_failure",
            Self::Storage(_) => "storage_failure",
            Self::Delivery(_) => "delivery_failure",
            Self::Grant(_) => "grant_failure",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Human-readable reason for the requester.
    ///
    /// Infrastructure details never leak into this text.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnknownIdentity(_) => {
                "We don't appear to have a user with that username. Please check that you typed your username correctly."
            }
            Self::DuplicateRequest(_) => {
                "We already sent an email to this username! Use the token from that email."
            }
            Self::InvalidToken => "Token is incorrect! Double check and make sure it is correct.",
            Self::Delivery(_) => "We couldn't send the verification email. Please try again later.",
            Self::Roster(_) | Self::Storage(_) | Self::Grant(_) | Self::Timeout(_) => {
                "Something went wrong on our side. Please try again later."
            }
        }
    }
}
