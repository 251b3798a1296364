//! Integration test common infrastructure.
//!
//! Recording collaborators and roster fixtures shared by the flow tests.

#![allow(dead_code)]

use admitd::config::VerificationConfig;
use admitd::grant::{AccessGranter, GrantError};
use admitd::notify::{Notifier, NotifyError};
use admitd::roster::{CsvRosterSource, Role, RosterIndex};
use admitd::service::VerificationService;
use admitd::store::TokenStore;
use async_trait::async_trait;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

/// A delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: String,
    pub token: String,
    pub username: String,
}

/// Notifier that remembers every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    /// Notifier that takes `delay` per delivery, to widen race windows.
    pub fn slow(delay: Duration) -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn last_token(&self) -> String {
        self.deliveries().last().expect("no delivery").token.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, to: &str, token: &str, username: &str) -> Result<(), NotifyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.deliveries.lock().unwrap().push(Delivery {
            to: to.to_string(),
            token: token.to_string(),
            username: username.to_string(),
        });
        Ok(())
    }
}

/// Granter that remembers every grant.
#[derive(Default)]
pub struct RecordingGranter {
    grants: Mutex<Vec<(String, Role)>>,
}

impl RecordingGranter {
    pub fn grants(&self) -> Vec<(String, Role)> {
        self.grants.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccessGranter for RecordingGranter {
    async fn grant(&self, requester: &str, role: Role) -> Result<(), GrantError> {
        self.grants
            .lock()
            .unwrap()
            .push((requester.to_string(), role));
        Ok(())
    }
}

/// Write a CSV roster file.
pub fn roster_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// A service over CSV rosters and the given store, plus its collaborators.
pub struct Harness {
    pub service: Arc<VerificationService>,
    pub notifier: Arc<RecordingNotifier>,
    pub granter: Arc<RecordingGranter>,
    // Kept alive for the lifetime of the harness.
    _students: NamedTempFile,
    _teachers: NamedTempFile,
}

pub const STUDENTS: &str = "username,email\n\"ann,anne\",\"a@x.com,anne@x.com\"\nbob,bob@x.com\n";
pub const TEACHERS: &str = "username,email\nprof,prof@x.com\n\"smith,jsmith\",\"smith@x.com,js@x.com\"\n";

impl Harness {
    pub fn new(store: Arc<dyn TokenStore>, options: VerificationConfig) -> Self {
        Self::with_notifier(store, options, RecordingNotifier::default())
    }

    pub fn with_notifier(
        store: Arc<dyn TokenStore>,
        options: VerificationConfig,
        notifier: RecordingNotifier,
    ) -> Self {
        let students = roster_file(STUDENTS);
        let teachers = roster_file(TEACHERS);
        let notifier = Arc::new(notifier);
        let granter = Arc::new(RecordingGranter::default());
        let service = VerificationService::new(
            RosterIndex::new(Arc::new(CsvRosterSource::new(
                students.path(),
                teachers.path(),
            ))),
            store,
            notifier.clone(),
            granter.clone(),
            options,
        );
        Self {
            service: Arc::new(service),
            notifier,
            granter,
            _students: students,
            _teachers: teachers,
        }
    }
}
