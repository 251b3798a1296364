//! Issuance repository: the SQLite token store.
//!
//! One row per username. The unique index on `username_key` turns the
//! duplicate check and the insert into a single atomic statement.

use super::DbError;
use crate::store::{StoreError, TokenIssuance, TokenStore, username_key};
use crate::token::tokens_match;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Repository for issuance operations.
#[derive(Clone)]
pub struct IssuanceRepository {
    pool: SqlitePool,
}

impl IssuanceRepository {
    /// Create a new issuance repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Row id, token and consumption time for a username.
    async fn fetch_token(&self, key: &str) -> Result<Option<(i64, String, Option<i64>)>, DbError> {
        let row = sqlx::query_as::<_, (i64, String, Option<i64>)>(
            r#"
            SELECT id, token, consumed_at
            FROM issuances
            WHERE username_key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl TokenStore for IssuanceRepository {
    async fn has_issuance(&self, username: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM issuances WHERE username_key = ?)",
        )
        .bind(username_key(username))
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(exists)
    }

    async fn validate(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        let row = self.fetch_token(&username_key(username)).await?;
        Ok(matches!(
            row,
            Some((_, stored, None)) if tokens_match(&stored, token)
        ))
    }

    async fn record(&self, username: &str, token: &str) -> Result<TokenIssuance, StoreError> {
        let now = chrono::Utc::now().timestamp();

        // UNIQUE(username_key) rejects a second issuance even when two
        // requests race past the caller's has_issuance check.
        sqlx::query(
            r#"
            INSERT INTO issuances (username, username_key, token, issued_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(username_key(username))
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::AlreadyIssued(username.to_string());
            }
            StoreError::from(DbError::from(e))
        })?;

        Ok(TokenIssuance {
            username: username.to_string(),
            token: token.to_string(),
            issued_at: now,
            consumed_at: None,
        })
    }

    async fn consume(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        let Some((id, stored, None)) = self.fetch_token(&username_key(username)).await? else {
            return Ok(false);
        };
        if !tokens_match(&stored, token) {
            return Ok(false);
        }

        // The consumed_at guard makes concurrent redemptions of the same
        // token race on a single UPDATE; only one sees a changed row.
        let result = sqlx::query(
            "UPDATE issuances SET consumed_at = ? WHERE id = ? AND consumed_at IS NULL",
        )
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn withdraw(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        let Some((id, stored, _)) = self.fetch_token(&username_key(username)).await? else {
            return Ok(false);
        };
        if !tokens_match(&stored, token) {
            return Ok(false);
        }

        let result = sqlx::query("DELETE FROM issuances WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, username: &str) -> Result<Option<TokenIssuance>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, i64, Option<i64>)>(
            r#"
            SELECT username, token, issued_at, consumed_at
            FROM issuances
            WHERE username_key = ?
            "#,
        )
        .bind(username_key(username))
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(row.map(|(username, token, issued_at, consumed_at)| TokenIssuance {
            username,
            token,
            issued_at,
            consumed_at,
        }))
    }
}
