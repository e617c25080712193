//! Shared types, errors, and configuration for Frith.
//!
//! This crate provides common types used across all other crates:
//! - Money in integer minor units with ISO 4217 currencies
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management
//! - JWT claims and token validation

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use auth::Claims;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use jwt::{JwtError, JwtService};
pub use types::{Currency, Money, MoneyError};
