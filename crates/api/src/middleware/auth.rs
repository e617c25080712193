//! Bearer-token authentication and organization scoping.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use frith_shared::types::{OrganizationId, UserId};
use frith_shared::{Claims, JwtError};

fn unauthorized(code: &'static str, message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, code, message)
}

fn bearer(request: &Request) -> Option<&str> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}

/// Rejects requests without a valid access token and stashes its claims
/// for [`AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer(&request) else {
        return unauthorized("missing_token", "Authorization: Bearer <token> is required")
            .into_response();
    };
    match state.jwt_service.verify(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(JwtError::Expired) => {
            unauthorized("token_expired", "Token has expired").into_response()
        }
        Err(_) => unauthorized("invalid_token", "Invalid or malformed token").into_response(),
    }
}

/// The authenticated caller.
///
/// Handlers call [`AuthUser::scope`] on the path's organization before
/// touching any data.
#[derive(Debug, Clone)]
pub struct AuthUser(Claims);

impl AuthUser {
    /// Acting user, recorded on every posting and approval.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.0.sub
    }

    /// Role name, checked against the override policy.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.0.role
    }

    /// The path's organization, if it is the one the token was issued for.
    ///
    /// # Errors
    ///
    /// Returns 403 for any other organization.
    pub fn scope(&self, org_id: Uuid) -> Result<OrganizationId, ApiError> {
        let requested = OrganizationId::from_uuid(org_id);
        if requested == self.0.org {
            Ok(requested)
        } else {
            Err(ApiError::forbidden(
                "You do not have access to this organization",
            ))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(Self)
            .ok_or_else(|| unauthorized("unauthorized", "Authentication required"))
    }
}
