//! Authorization for approving unbalanced reconciliations.

use frith_shared::config::TrustConfig;

use super::types::Approver;

/// Decides who may approve a reconciliation that does not balance.
#[cfg_attr(test, mockall::automock)]
pub trait OverridePolicy: Send + Sync {
    /// Returns true if `approver` may override.
    fn may_override(&self, approver: &Approver) -> bool;
}

/// Grants override to a fixed set of organization roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOverridePolicy {
    roles: Vec<String>,
}

impl RoleOverridePolicy {
    /// Creates a policy allowing the given roles (case-insensitive).
    #[must_use]
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            roles: roles
                .into_iter()
                .map(|r| r.as_ref().trim().to_lowercase())
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }

    /// Roles allowed to override.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl Default for RoleOverridePolicy {
    fn default() -> Self {
        Self::from(&TrustConfig::default())
    }
}

impl From<&TrustConfig> for RoleOverridePolicy {
    fn from(config: &TrustConfig) -> Self {
        Self::new(&config.override_roles)
    }
}

impl OverridePolicy for RoleOverridePolicy {
    fn may_override(&self, approver: &Approver) -> bool {
        let role = approver.role.to_lowercase();
        self.roles.iter().any(|r| *r == role)
    }
}
