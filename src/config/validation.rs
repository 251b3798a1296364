//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{Config, NotifierKind};
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("roster.students does not exist: {0}")]
    StudentRosterNotFound(String),
    #[error("roster.teachers does not exist: {0}")]
    TeacherRosterNotFound(String),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("notifier.url is required when notifier.kind = \"webhook\"")]
    MissingWebhookUrl,
    #[error("notifier.url must start with http:// or https://, got '{0}'")]
    InvalidWebhookUrl(String),
    #[error("verification.delivery_attempts must be at least 1")]
    NoDeliveryAttempts,
    #[error("verification.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("verification.command_prefix must not be empty or contain whitespace")]
    InvalidCommandPrefix,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !Path::new(&config.roster.students).exists() {
        errors.push(ValidationError::StudentRosterNotFound(
            config.roster.students.clone(),
        ));
    }
    if !Path::new(&config.roster.teachers).exists() {
        errors.push(ValidationError::TeacherRosterNotFound(
            config.roster.teachers.clone(),
        ));
    }

    if config.database.path != ":memory:" {
        let db_path = Path::new(&config.database.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(
                config.database.path.clone(),
            ));
        }
    }

    if config.notifier.kind == NotifierKind::Webhook {
        match config.notifier.url.as_deref() {
            None | Some("") => errors.push(ValidationError::MissingWebhookUrl),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                errors.push(ValidationError::InvalidWebhookUrl(url.to_string()));
            }
            Some(_) => {}
        }
    }

    let verification = &config.verification;
    if verification.delivery_attempts == 0 {
        errors.push(ValidationError::NoDeliveryAttempts);
    }
    if verification.storage_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("storage_timeout_secs"));
    }
    if verification.delivery_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("delivery_timeout_secs"));
    }
    if verification.command_prefix.is_empty()
        || verification.command_prefix.chars().any(char::is_whitespace)
    {
        errors.push(ValidationError::InvalidCommandPrefix);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
