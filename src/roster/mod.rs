//! Roster resolution.
//!
//! The roster is owned by an external enrollment system and is read-only
//! here. It is split into two sources, students and teachers; each row holds
//! a comma-joined list of usernames and a positionally paired comma-joined
//! list of email addresses.
//!
//! [`RosterIndex`] implements the lookup policy on top of any
//! [`RosterSource`]: students are scanned before teachers, matching is exact
//! and case-sensitive, and the first matching row wins.

mod file;

pub use file::CsvRosterSource;

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Role conferred by the roster source that contained a username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    /// Lookup order. A username listed in both sources resolves as a student.
    pub const SCAN_ORDER: [Role; 2] = [Role::Student, Role::Teacher];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roster errors.
///
/// "Username not on the roster" is not an error; [`RosterIndex::resolve`]
/// reports it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to read {role} roster: {source}")]
    Io {
        role: Role,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {role} roster: {source}")]
    Parse {
        role: Role,
        #[source]
        source: csv::Error,
    },
    #[error("{role} roster row {row} lists {aliases} usernames but {emails} emails")]
    Malformed {
        role: Role,
        row: usize,
        aliases: usize,
        emails: usize,
    },
}

/// One raw roster row, as stored by the enrollment system.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterRow {
    /// Comma-joined usernames.
    #[serde(rename = "username")]
    pub usernames: String,
    /// Comma-joined emails, positionally paired with `usernames`.
    #[serde(rename = "email")]
    pub emails: String,
}

impl RosterRow {
    pub fn new(usernames: impl Into<String>, emails: impl Into<String>) -> Self {
        Self {
            usernames: usernames.into(),
            emails: emails.into(),
        }
    }

    /// Match `username` against this row.
    ///
    /// `row` is the 1-based position of this row in its source and is only
    /// used for error reporting.
    fn resolve(
        &self,
        username: &str,
        role: Role,
        row: usize,
    ) -> Result<Option<RosterEntry>, RosterError> {
        let aliases: Vec<String> = split_list(&self.usernames);
        let Some(position) = aliases
            .iter()
            .position(|alias| !alias.is_empty() && alias == username)
        else {
            return Ok(None);
        };

        let emails = split_list(&self.emails);
        if emails.len() != aliases.len() {
            return Err(RosterError::Malformed {
                role,
                row,
                aliases: aliases.len(),
                emails: emails.len(),
            });
        }

        Ok(Some(RosterEntry {
            email: emails[position].clone(),
            aliases,
            role,
        }))
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',').map(str::to_string).collect()
}

/// A resolved roster identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Every username on the matched row, in roster order.
    pub aliases: Vec<String>,
    /// Email paired with the username that was looked up.
    pub email: String,
    pub role: Role,
}

/// Read access to the two roster sources.
///
/// Implementations must return the current contents on every call; caching
/// is the implementation's business, not the index's.
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// All rows of the source for `role`, in source order.
    async fn rows(&self, role: Role) -> Result<Vec<RosterRow>, RosterError>;
}

/// Fixed in-memory roster, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRosterSource {
    students: Vec<RosterRow>,
    teachers: Vec<RosterRow>,
}

impl StaticRosterSource {
    pub fn new(students: Vec<RosterRow>, teachers: Vec<RosterRow>) -> Self {
        Self { students, teachers }
    }
}

#[async_trait]
impl RosterSource for StaticRosterSource {
    async fn rows(&self, role: Role) -> Result<Vec<RosterRow>, RosterError> {
        Ok(match role {
            Role::Student => self.students.clone(),
            Role::Teacher => self.teachers.clone(),
        })
    }
}

/// Username to (email, role) resolution over a [`RosterSource`].
#[derive(Clone)]
pub struct RosterIndex {
    source: Arc<dyn RosterSource>,
}

impl RosterIndex {
    pub fn new(source: Arc<dyn RosterSource>) -> Self {
        Self { source }
    }

    /// Resolve a username to its roster entry.
    ///
    /// Returns `Ok(None)` when neither source lists the username. The teacher
    /// source is not read when the student source already matched.
    pub async fn resolve(&self, username: &str) -> Result<Option<RosterEntry>, RosterError> {
        for role in Role::SCAN_ORDER {
            let rows = self.source.rows(role).await?;
            for (index, row) in rows.iter().enumerate() {
                match row.resolve(username, role, index + 1) {
                    Ok(Some(entry)) => {
                        debug!(username = %username, role = %role, "Roster match");
                        return Ok(Some(entry));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(username = %username, error = %e, "Malformed roster row");
                        return Err(e);
                    }
                }
            }
        }
        Ok(None)
    }
}
