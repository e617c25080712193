//! Core business logic for Frith.
//!
//! This crate contains pure business logic with no web or database
//! dependencies. Every operation takes its inputs explicitly and returns the
//! new state; persistence and locking belong to `frith-db`.
//!
//! # Modules
//!
//! - `trust` - Client trust ledger and compliance checks
//! - `reconciliation` - Three-way reconciliation and approval workflow
//! - `billing` - Invoices, payments and write-offs
//! - `render` - Paginated invoice layout
//! - `currency` - Money display formatting

pub mod billing;
pub mod currency;
pub mod reconciliation;
pub mod render;
pub mod trust;
