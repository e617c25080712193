//! Reconciliation domain types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use frith_shared::types::{
    OrganizationId, ReconciliationId, StatementImportId, StatementLineId, TrustAccountId,
    TrustTransactionId, UserId,
};
use frith_shared::Money;

use super::error::ReconciliationError;

/// Inclusive date range covered by a bank statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPeriod {
    /// First day.
    pub start: NaiveDate,
    /// Last day.
    pub end: NaiveDate,
}

impl StatementPeriod {
    /// Creates a period.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriod` if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReconciliationError> {
        if start > end {
            return Err(ReconciliationError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// Returns true if `date` falls inside the period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Source format of an imported statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementFormat {
    /// Comma-separated export.
    Csv,
    /// Open Financial Exchange.
    Ofx,
    /// Quicken Financial Exchange.
    Qfx,
    /// Keyed in by hand.
    Manual,
}

impl StatementFormat {
    /// Returns the string representation of the format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Ofx => "ofx",
            Self::Qfx => "qfx",
            Self::Manual => "manual",
        }
    }

    /// Parses a format from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "ofx" => Some(Self::Ofx),
            "qfx" => Some(Self::Qfx),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// One statement line as produced by a parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedStatementLine {
    /// Posting date.
    pub date: NaiveDate,
    /// Signed amount: credits positive, debits negative.
    pub amount: Money,
    /// Bank description.
    pub description: String,
    /// Check number or bank reference.
    pub reference: Option<String>,
}

/// A persisted statement line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    /// Line ID.
    pub id: StatementLineId,
    /// Posting date.
    pub date: NaiveDate,
    /// Signed amount.
    pub amount: Money,
    /// Bank description.
    pub description: String,
    /// Check number or bank reference.
    pub reference: Option<String>,
}

/// Input for importing a statement.
#[derive(Debug, Clone)]
pub struct NewStatementImport {
    /// Period covered.
    pub period: StatementPeriod,
    /// Balance at period start.
    pub opening_balance: Money,
    /// Balance at period end.
    pub closing_balance: Money,
    /// Source format.
    pub format: StatementFormat,
    /// Parsed lines.
    pub lines: Vec<ParsedStatementLine>,
    /// Who imported it.
    pub imported_by: UserId,
}

/// An imported bank statement. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankStatementImport {
    /// Import ID.
    pub id: StatementImportId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Trust account the statement belongs to.
    pub trust_account_id: TrustAccountId,
    /// Period covered.
    pub period: StatementPeriod,
    /// Balance at period start.
    pub opening_balance: Money,
    /// Balance at period end.
    pub closing_balance: Money,
    /// Source format.
    pub format: StatementFormat,
    /// Statement lines in file order.
    pub lines: Vec<StatementLine>,
    /// Who imported it.
    pub imported_by: UserId,
    /// When it was imported.
    pub imported_at: DateTime<Utc>,
}

/// A balance figure taking part in a three-way reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    /// Statement closing balance adjusted for outstanding items.
    Statement,
    /// Statement opening balance plus transactions cleared on it.
    ClearedActivity,
    /// Trust account book balance.
    Book,
    /// Sum of client ledger balances.
    ClientLedgers,
}

impl BalanceSource {
    /// Returns the string representation of the source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Statement => "statement",
            Self::ClearedActivity => "cleared_activity",
            Self::Book => "book",
            Self::ClientLedgers => "client_ledgers",
        }
    }
}

impl fmt::Display for BalanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two balance figures that should agree but do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// First figure.
    pub left: BalanceSource,
    /// Second figure.
    pub right: BalanceSource,
    /// Value of the first figure.
    pub left_amount: Money,
    /// Value of the second figure.
    pub right_amount: Money,
    /// `left_amount - right_amount`.
    pub difference: Money,
}

/// Reconciliation workflow status.
///
/// - Draft → Pending (submit)
/// - Pending → Approved (approve)
/// - Flagged → Approved (approve with override only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    /// Balanced, awaiting submission.
    Draft,
    /// Submitted for approval.
    Pending,
    /// Approved.
    Approved,
    /// Has discrepancies; blocks plain approval.
    Flagged,
}

impl ReconciliationStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Flagged => "flagged",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "flagged" => Some(Self::Flagged),
            _ => None,
        }
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computed figures of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Account reconciled.
    pub trust_account_id: TrustAccountId,
    /// Period reconciled.
    pub period: StatementPeriod,
    /// Closing balance as printed on the statement.
    pub statement_closing_balance: Money,
    /// Deposits not yet on a statement covering this period.
    pub outstanding_deposits: Money,
    /// Withdrawals not yet on a statement covering this period.
    pub outstanding_withdrawals: Money,
    /// `statement_closing_balance + outstanding_deposits - outstanding_withdrawals`.
    pub adjusted_statement_balance: Money,
    /// Opening balance plus activity cleared on the supplied statement.
    pub cleared_balance: Option<Money>,
    /// Trust account book balance.
    pub book_balance: Money,
    /// Sum of client ledger balances.
    pub ledger_total: Money,
    /// Transactions counted as outstanding.
    pub outstanding_transaction_ids: Vec<TrustTransactionId>,
    /// Every disagreeing pair.
    pub discrepancies: Vec<Discrepancy>,
    /// True iff there are no discrepancies.
    pub is_balanced: bool,
}

/// A persisted reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Reconciliation ID.
    pub id: ReconciliationId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Statement the run was based on.
    pub statement_import_id: Option<StatementImportId>,
    /// Computed figures.
    pub report: ReconciliationReport,
    /// Workflow status.
    pub status: ReconciliationStatus,
    /// Who ran it.
    pub prepared_by: UserId,
    /// When it was run.
    pub prepared_at: DateTime<Utc>,
    /// Who submitted it.
    pub submitted_by: Option<UserId>,
    /// Who approved it.
    pub approved_by: Option<UserId>,
    /// When it was approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// Justification recorded when an unbalanced run was approved.
    pub override_justification: Option<String>,
}

/// The principal approving a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approver {
    /// User ID.
    pub user_id: UserId,
    /// Role in the organization.
    pub role: String,
}
