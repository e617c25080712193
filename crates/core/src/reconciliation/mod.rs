//! Three-way trust reconciliation.
//!
//! This module implements:
//! - Bank statement import (with a header-driven CSV parser)
//! - Explicit, audited clearing of trust transactions against a statement
//! - Statement vs. book vs. client-ledger comparison with discrepancy records
//! - The draft → pending → approved workflow and policy-gated override

pub mod engine;
pub mod error;
pub mod policy;
pub mod statement;
pub mod types;

pub use engine::{ReconcileInput, ReconciliationEngine};
pub use error::ReconciliationError;
pub use policy::{OverridePolicy, RoleOverridePolicy};
pub use statement::parse_csv;
pub use types::{
    Approver, BalanceSource, BankStatementImport, Discrepancy, NewStatementImport,
    ParsedStatementLine, Reconciliation, ReconciliationReport, ReconciliationStatus,
    StatementFormat, StatementLine, StatementPeriod,
};
