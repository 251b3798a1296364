//! Token issuance storage.
//!
//! The store records which usernames have been sent a token and what that
//! token was. Usernames are keyed case-insensitively; tokens compare exactly.
//! Recording is an atomic check-and-insert, so two racing first-time
//! requests for one username cannot both issue a token.
//!
//! Backends:
//! - [`crate::db::IssuanceRepository`]: SQLite, the production store
//! - [`MemoryTokenStore`]: process-local, for embedding and tests

mod memory;

pub use memory::MemoryTokenStore;

use crate::db::DbError;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Token store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a token has already been issued for {0}")]
    AlreadyIssued(String),
    #[error(transparent)]
    Database(#[from] DbError),
}

/// A token issued to a username.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenIssuance {
    /// Username as it was submitted when the token was issued.
    pub username: String,
    pub token: String,
    /// Unix timestamp (seconds).
    pub issued_at: i64,
    /// Unix timestamp (seconds) of redemption; only set in single-use mode.
    pub consumed_at: Option<i64>,
}

impl fmt::Debug for TokenIssuance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuance")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("consumed_at", &self.consumed_at)
            .finish()
    }
}

/// Persistent record of issued tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Whether any issuance exists for `username`, consumed or not.
    async fn has_issuance(&self, username: &str) -> Result<bool, StoreError>;

    /// Whether `token` is the unconsumed token issued to `username`.
    async fn validate(&self, username: &str, token: &str) -> Result<bool, StoreError>;

    /// Record a new issuance.
    ///
    /// Fails with [`StoreError::AlreadyIssued`] if `username` already has
    /// one; the existence check and the insert happen atomically.
    async fn record(&self, username: &str, token: &str) -> Result<TokenIssuance, StoreError>;

    /// Validate and mark consumed in one step. Returns `false` if the token
    /// does not match or was already consumed.
    async fn consume(&self, username: &str, token: &str) -> Result<bool, StoreError>;

    /// Remove an issuance whose token never reached the user. Returns
    /// whether a matching record was removed.
    async fn withdraw(&self, username: &str, token: &str) -> Result<bool, StoreError>;

    /// Fetch the issuance for `username`, if any.
    async fn get(&self, username: &str) -> Result<Option<TokenIssuance>, StoreError>;
}

/// Case-insensitive key for a username.
pub fn username_key(username: &str) -> String {
    username.to_lowercase()
}
