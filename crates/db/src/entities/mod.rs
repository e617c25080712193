//! `SeaORM` entity definitions.
//!
//! Amounts are `i64` minor units; the currency lives on the owning account,
//! statement or invoice row. Enumerations are stored as lowercase text and
//! parsed into core types by the repositories.

pub mod bank_statement_imports;
pub mod bank_statement_lines;
pub mod client_ledgers;
pub mod invoice_line_items;
pub mod invoice_sequences;
pub mod invoices;
pub mod organizations;
pub mod payments;
pub mod reconciliations;
pub mod trust_accounts;
pub mod trust_transactions;
