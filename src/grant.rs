//! Access granting after successful verification.

use crate::config::RolesConfig;
use crate::roster::Role;
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Grant errors.
#[derive(Debug, Error)]
pub enum GrantError {
    #[error("requester {0} is not known to the host")]
    UnknownRequester(String),
    #[error("host rejected grant: {0}")]
    Host(String),
}

/// Performs whatever side effect gives a verified requester their role.
///
/// `requester` identifies the caller in the host system (for a chat bot, the
/// user id of the person who sent the command); the core passes it through
/// untouched.
#[async_trait]
pub trait AccessGranter: Send + Sync {
    async fn grant(&self, requester: &str, role: Role) -> Result<(), GrantError>;
}

/// Maps roles to host role identifiers.
#[derive(Debug, Clone)]
pub struct RoleMap {
    student: String,
    teacher: String,
}

impl RoleMap {
    pub fn new(config: &RolesConfig) -> Self {
        Self {
            student: config.student.clone(),
            teacher: config.teacher.clone(),
        }
    }

    pub fn host_role(&self, role: Role) -> &str {
        match role {
            Role::Student => &self.student,
            Role::Teacher => &self.teacher,
        }
    }
}

/// Granter that records the grant in the log. Used by the console host,
/// where there is no role system to mutate.
#[derive(Debug, Clone)]
pub struct LogGranter {
    roles: RoleMap,
}

impl LogGranter {
    pub fn new(roles: RoleMap) -> Self {
        Self { roles }
    }
}

#[async_trait]
impl AccessGranter for LogGranter {
    async fn grant(&self, requester: &str, role: Role) -> Result<(), GrantError> {
        info!(
            requester = %requester,
            role = %role,
            host_role = %self.roles.host_role(role),
            "Role granted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_map_uses_configured_ids() {
        let roles = RoleMap::new(&RolesConfig {
            student: "1001".to_string(),
            teacher: "1002".to_string(),
        });
        assert_eq!(roles.host_role(Role::Student), "1001");
        assert_eq!(roles.host_role(Role::Teacher), "1002");
    }

    #[tokio::test]
    async fn log_granter_succeeds() {
        let granter = LogGranter::new(RoleMap::new(&RolesConfig::default()));
        assert!(granter.grant("user#1", Role::Teacher).await.is_ok());
    }
}
