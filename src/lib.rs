//! admitd - roster email verification.
//!
//! A requester claims a roster username; the daemon looks up the email on
//! file, sends a one-time token there, and grants the roster role when the
//! token comes back.
//!
//! The verification core is [`service::VerificationService`]. Its
//! collaborators sit behind traits so hosts can swap them:
//! [`roster::RosterSource`], [`store::TokenStore`], [`notify::Notifier`] and
//! [`grant::AccessGranter`].

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod grant;
pub mod notify;
pub mod roster;
pub mod service;
pub mod store;
pub mod token;

pub use error::VerifyError;
pub use roster::Role;
pub use service::{Outcome, VerificationRequest, VerificationService};
