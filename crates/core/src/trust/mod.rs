//! Client trust accounting.
//!
//! This module implements the trust ledger:
//! - Trust accounts and per-client sub-ledgers
//! - Typed transactions with non-negative balance enforcement
//! - Append-only reversals
//! - Book balance vs. ledger total integrity checks
//! - Compliance alerts (commingling, dormancy, stale reconciliation)

pub mod compliance;
pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use compliance::{
    AccountSnapshot, AlertKind, AlertSeverity, ComplianceAlert, ComplianceChecker,
    ComplianceThresholds,
};
pub use error::TrustError;
pub use service::TrustLedgerEngine;
pub use types::{
    BalanceEffect, Clearance, ClientLedger, CreateTrustAccountInput, IntegrityReport, LedgerDrift,
    OpenLedgerInput, Posting, RecordTransactionInput, Replay, TrustAccount, TrustAccountType,
    TrustStatus, TrustTransaction, TrustTransactionType,
};
