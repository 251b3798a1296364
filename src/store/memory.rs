//! Process-local token store.

use super::{StoreError, TokenIssuance, TokenStore, username_key};
use crate::token::tokens_match;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Token store held in a concurrent map. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    issuances: DashMap<String, TokenIssuance>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored issuances.
    pub fn len(&self) -> usize {
        self.issuances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issuances.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn has_issuance(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.issuances.contains_key(&username_key(username)))
    }

    async fn validate(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .issuances
            .get(&username_key(username))
            .is_some_and(|issuance| {
                issuance.consumed_at.is_none() && tokens_match(&issuance.token, token)
            }))
    }

    async fn record(&self, username: &str, token: &str) -> Result<TokenIssuance, StoreError> {
        // The entry guard holds the shard lock across the check and the insert.
        match self.issuances.entry(username_key(username)) {
            Entry::Occupied(_) => Err(StoreError::AlreadyIssued(username.to_string())),
            Entry::Vacant(slot) => {
                let issuance = TokenIssuance {
                    username: username.to_string(),
                    token: token.to_string(),
                    issued_at: chrono::Utc::now().timestamp(),
                    consumed_at: None,
                };
                slot.insert(issuance.clone());
                Ok(issuance)
            }
        }
    }

    async fn consume(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        let Some(mut issuance) = self.issuances.get_mut(&username_key(username)) else {
            return Ok(false);
        };
        if issuance.consumed_at.is_some() || !tokens_match(&issuance.token, token) {
            return Ok(false);
        }
        issuance.consumed_at = Some(chrono::Utc::now().timestamp());
        Ok(true)
    }

    async fn withdraw(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .issuances
            .remove_if(&username_key(username), |_, issuance| {
                tokens_match(&issuance.token, token)
            })
            .is_some())
    }

    async fn get(&self, username: &str) -> Result<Option<TokenIssuance>, StoreError> {
        Ok(self
            .issuances
            .get(&username_key(username))
            .map(|issuance| issuance.clone()))
    }
}
