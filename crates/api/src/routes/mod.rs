//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::auth_middleware};

pub mod health;
pub mod invoices;
pub mod reconciliations;
pub mod trust;

/// Creates the API router: public health check plus authenticated,
/// organization-scoped routes.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(trust::routes())
        .merge(reconciliations::routes())
        .merge(invoices::routes())
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header::AUTHORIZATION},
    };
    use http_body_util::BodyExt;
    use rstest::rstest;
    use sea_orm::DatabaseConnection;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    use frith_shared::config::{BillingConfig, JwtConfig, TrustConfig};
    use frith_shared::JwtService;
    use frith_shared::types::{OrganizationId, UserId};

    use crate::{AppState, create_router};

    fn state() -> AppState {
        AppState {
            db: Arc::new(DatabaseConnection::default()),
            jwt_service: Arc::new(JwtService::new(&JwtConfig {
                secret: "test-secret-at-least-32-bytes-long!!".to_string(),
                access_token_expiry_secs: 300,
            })),
            billing: Arc::new(BillingConfig::default()),
            trust: Arc::new(TrustConfig::default()),
        }
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = create_router(state(), Duration::from_secs(5))
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let request = Request::get("/api/v1/health").body(Body::empty()).unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
    }

    #[rstest]
    #[case("trust-accounts")]
    #[case("invoices")]
    #[case("trust-compliance/alerts")]
    #[tokio::test]
    async fn test_missing_token_is_unauthorized(#[case] path: &str) {
        let uri = format!("/api/v1/organizations/{}/{path}", Uuid::new_v4());
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "missing_token");
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let uri = format!("/api/v1/organizations/{}/invoices", Uuid::new_v4());
        let request = Request::get(uri)
            .header(AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "invalid_token");
    }

    #[rstest]
    #[case("trust-accounts")]
    #[case("invoices")]
    #[case("trust-accounts/00000000-0000-0000-0000-000000000001/reconciliations")]
    #[tokio::test]
    async fn test_other_organization_is_forbidden(#[case] path: &str) {
        let state = state();
        let token = state
            .jwt_service
            .issue(UserId::new(), OrganizationId::new(), "owner")
            .unwrap();
        let uri = format!("/api/v1/organizations/{}/{path}", Uuid::new_v4());
        let request = Request::get(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = create_router(state, Duration::from_secs(5))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "FORBIDDEN");
    }
}
