//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repositories for trust ledgers, reconciliations and invoices
//! - Row-level security scoping per organization
//! - Database migrations

mod convert;
pub mod entities;
pub mod migration;
pub mod repositories;
pub mod rls;

pub use repositories::{
    InvoiceRepository, OrganizationRepository, ReconciliationRepository, TrustRepository,
};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use frith_shared::config::DatabaseConfig;

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
