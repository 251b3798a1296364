//! CSV-file roster source.

use super::{Role, RosterError, RosterRow, RosterSource};
use crate::config::RosterConfig;
use async_trait::async_trait;
use std::path::PathBuf;

/// Roster backed by two CSV files, re-read on every lookup.
///
/// Each file needs a header row with `username` and `email` columns; other
/// columns are ignored. Fields holding several usernames must be quoted.
#[derive(Debug, Clone)]
pub struct CsvRosterSource {
    students: PathBuf,
    teachers: PathBuf,
}

impl CsvRosterSource {
    pub fn new(students: impl Into<PathBuf>, teachers: impl Into<PathBuf>) -> Self {
        Self {
            students: students.into(),
            teachers: teachers.into(),
        }
    }

    pub fn from_config(config: &RosterConfig) -> Self {
        Self::new(&config.students, &config.teachers)
    }

    fn path(&self, role: Role) -> &PathBuf {
        match role {
            Role::Student => &self.students,
            Role::Teacher => &self.teachers,
        }
    }
}

#[async_trait]
impl RosterSource for CsvRosterSource {
    async fn rows(&self, role: Role) -> Result<Vec<RosterRow>, RosterError> {
        let content = tokio::fs::read(self.path(role))
            .await
            .map_err(|source| RosterError::Io { role, source })?;

        parse_rows(&content).map_err(|source| RosterError::Parse { role, source })
    }
}

fn parse_rows(content: &[u8]) -> Result<Vec<RosterRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(content);

    reader.deserialize().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RosterIndex;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn parses_quoted_alias_lists_and_extra_columns() {
        let rows = parse_rows(
            b"id,username,email,grade\n1,\"ann,anne\",\"a@x.com,anne@x.com\",9\n2,bob,b@x.com,10\n",
        )
        .unwrap();
        assert_eq!(
            rows,
            vec![
                RosterRow::new("ann,anne", "a@x.com,anne@x.com"),
                RosterRow::new("bob", "b@x.com"),
            ]
        );
    }

    #[test]
    fn missing_email_column_is_a_parse_error() {
        assert!(parse_rows(b"username\nann\n").is_err());
    }

    #[tokio::test]
    async fn resolves_from_files() {
        let students = csv_file("username,email\n\"ann,anne\",\"a@x.com,anne@x.com\"\n");
        let teachers = csv_file("username,email\nprof,prof@x.com\n");
        let index = RosterIndex::new(Arc::new(CsvRosterSource::new(
            students.path(),
            teachers.path(),
        )));

        let entry = index.resolve("anne").await.unwrap().unwrap();
        assert_eq!(entry.email, "anne@x.com");
        assert_eq!(entry.role, Role::Student);

        let entry = index.resolve("prof").await.unwrap().unwrap();
        assert_eq!(entry.role, Role::Teacher);
    }

    #[tokio::test]
    async fn picks_up_edits_without_restart() {
        let mut students = csv_file("username,email\nann,a@x.com\n");
        let teachers = csv_file("username,email\n");
        let index = RosterIndex::new(Arc::new(CsvRosterSource::new(
            students.path(),
            teachers.path(),
        )));
        assert!(index.resolve("zed").await.unwrap().is_none());

        students.write_all(b"zed,z@x.com\n").unwrap();
        students.flush().unwrap();
        let entry = index.resolve("zed").await.unwrap().unwrap();
        assert_eq!(entry.email, "z@x.com");
    }

    #[tokio::test]
    async fn unreadable_file_is_io_error() {
        let source = CsvRosterSource::new("/nonexistent/students.csv", "/nonexistent/t.csv");
        let err = source.rows(Role::Student).await.unwrap_err();
        assert!(matches!(err, RosterError::Io { role: Role::Student, .. }));
    }
}
