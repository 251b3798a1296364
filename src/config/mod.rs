//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and TOML loading
//! - [`validation`]: Startup checks that report every problem at once

mod types;
mod validation;

pub use types::{
    Config, ConfigError, DatabaseConfig, NotifierConfig, NotifierKind, RolesConfig, RosterConfig,
    VerificationConfig,
};
pub use validation::{ValidationError, validate};
