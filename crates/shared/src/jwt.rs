//! HS256 access tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use crate::auth::Claims;
use crate::config::JwtConfig;
use crate::types::{OrganizationId, UserId};

/// Why a token could not be issued or accepted.
#[derive(Debug, Error)]
pub enum JwtError {
    /// Encoding failed.
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// Bad signature, malformed token or missing claims.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// Past `exp`.
    #[error("token has expired")]
    Expired,
}

/// Signs and verifies access tokens with one shared secret.
#[derive(Clone)]
pub struct JwtService {
    lifetime: Duration,
    signing: EncodingKey,
    verifying: DecodingKey,
}

impl JwtService {
    /// Keys and token lifetime from configuration.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let secs = i64::try_from(config.access_token_expiry_secs).unwrap_or(i64::MAX);
        let secret = config.secret.as_bytes();
        Self {
            lifetime: Duration::try_seconds(secs).unwrap_or(Duration::MAX),
            signing: EncodingKey::from_secret(secret),
            verifying: DecodingKey::from_secret(secret),
        }
    }

    /// Issues a token for `user` acting in `org`.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Signing` if the claims cannot be encoded.
    pub fn issue(
        &self,
        user: UserId,
        org: OrganizationId,
        role: &str,
    ) -> Result<String, JwtError> {
        let expires_at = Utc::now()
            .checked_add_signed(self.lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let claims = Claims::new(user, org, role, expires_at);
        encode(&Header::default(), &claims, &self.signing)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    /// Verifies the signature and expiry of `token`.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Expired` past `exp`, otherwise `JwtError::Invalid`.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.verifying, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> JwtService {
        JwtService::new(&JwtConfig {
            secret: secret.to_string(),
            access_token_expiry_secs: 900,
        })
    }

    #[test]
    fn test_issued_token_verifies() {
        let jwt = service("frith-test-secret");
        let user = UserId::new();
        let org = OrganizationId::new();

        let claims = jwt.verify(&jwt.issue(user, org, "bookkeeper").unwrap()).unwrap();

        assert_eq!(claims.sub, user);
        assert_eq!(claims.org, org);
        assert_eq!(claims.role, "bookkeeper");
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            service("frith-test-secret").verify("not.a.token"),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn test_foreign_signature_is_invalid() {
        let token = service("some-other-firm")
            .issue(UserId::new(), OrganizationId::new(), "partner")
            .unwrap();
        assert!(matches!(
            service("frith-test-secret").verify(&token),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn test_lapsed_token_is_expired() {
        let jwt = service("frith-test-secret");
        let lapsed = Claims::new(
            UserId::new(),
            OrganizationId::new(),
            "partner",
            Utc::now() - Duration::hours(1),
        );
        let token = encode(&Header::default(), &lapsed, &jwt.signing).unwrap();
        assert!(matches!(jwt.verify(&token), Err(JwtError::Expired)));
    }
}
