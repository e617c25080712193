//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST routes for trust accounts, reconciliations and invoices
//! - Authentication middleware and organization scoping
//! - Domain error to HTTP response mapping

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use frith_shared::JwtService;
use frith_shared::config::{BillingConfig, TrustConfig};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
    /// Invoice numbering and due-date defaults.
    pub billing: Arc<BillingConfig>,
    /// Compliance thresholds and override roles.
    pub trust: Arc<TrustConfig>,
}

/// Creates the main application router.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
