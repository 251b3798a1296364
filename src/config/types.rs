//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Roster file locations.
    pub roster: RosterConfig,
    /// Token storage configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Verification flow tuning.
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Outbound delivery of tokens.
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// Host role identifiers granted on success.
    #[serde(default)]
    pub roles: RolesConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Roster source configuration.
///
/// Both files are CSV with a header row containing `username` and `email`.
/// They are re-read on every lookup, so edits by the enrollment system take
/// effect without a restart.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    /// Path to the student roster.
    pub students: String,
    /// Path to the teacher roster.
    pub teachers: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "admitd.db".to_string()
}

/// Verification flow configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Mark a token consumed on its first successful use (default: false).
    ///
    /// When off, a verified user can resubmit the same token to get their
    /// role back.
    #[serde(default)]
    pub single_use: bool,

    /// Upper bound on a single roster read or store operation, in seconds (default: 5).
    #[serde(default = "default_storage_timeout")]
    pub storage_timeout_secs: u64,

    /// Upper bound on a single delivery attempt, in seconds (default: 30).
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// Delivery attempts before giving up and withdrawing the token (default: 3).
    #[serde(default = "default_delivery_attempts")]
    pub delivery_attempts: u32,

    /// Pause between delivery attempts, in milliseconds (default: 500).
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Chat command prefix recognized by the host adapter (default: "!").
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl VerificationConfig {
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            single_use: false,
            storage_timeout_secs: default_storage_timeout(),
            delivery_timeout_secs: default_delivery_timeout(),
            delivery_attempts: default_delivery_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            command_prefix: default_command_prefix(),
        }
    }
}

fn default_storage_timeout() -> u64 {
    5
}

fn default_delivery_timeout() -> u64 {
    30
}

fn default_delivery_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_command_prefix() -> String {
    "!".to_string()
}

/// Which notifier backend delivers tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Write the message to the log only. Development use.
    #[default]
    Log,
    /// POST the rendered message to an HTTP mail relay.
    Webhook,
}

/// Notifier configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub kind: NotifierKind,
    /// Relay endpoint; required when `kind = "webhook"`.
    pub url: Option<String>,
    /// Optional bearer token sent to the relay.
    pub auth_token: Option<String>,
    /// Sender address placed in the message.
    #[serde(default = "default_from")]
    pub from: String,
    /// Message subject line.
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Contact address quoted in help and error replies.
    pub contact: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
            url: None,
            auth_token: None,
            from: default_from(),
            subject: default_subject(),
            contact: None,
        }
    }
}

fn default_from() -> String {
    "Verifier <noreply@localhost>".to_string()
}

fn default_subject() -> String {
    "Account verification".to_string()
}

/// Host role identifiers handed to the access granter.
#[derive(Debug, Clone, Deserialize)]
pub struct RolesConfig {
    #[serde(default = "default_student_role")]
    pub student: String,
    #[serde(default = "default_teacher_role")]
    pub teacher: String,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            student: default_student_role(),
            teacher: default_teacher_role(),
        }
    }
}

fn default_student_role() -> String {
    "student".to_string()
}

fn default_teacher_role() -> String {
    "teacher".to_string()
}
