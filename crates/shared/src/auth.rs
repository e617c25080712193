//! Claims carried by access tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OrganizationId, UserId};

/// Who is calling, for which firm, in what role.
///
/// Every route is scoped to `org`; `role` decides who may approve a
/// reconciliation override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Acting user.
    pub sub: UserId,
    /// Firm the token was issued for.
    pub org: OrganizationId,
    /// Role within that firm.
    pub role: String,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
}

impl Claims {
    /// Claims for `sub` acting in `org` until `expires_at`.
    #[must_use]
    pub fn new(
        sub: UserId,
        org: OrganizationId,
        role: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub,
            org,
            role: role.into(),
            exp: expires_at.timestamp(),
        }
    }
}
