//! Trust account domain types.
//!
//! A trust account is one bank account holding client funds. Each client (or
//! client matter) has a sub-ledger inside it. The account's book balance is the
//! running total of every posting and must always equal the sum of its ledger
//! balances.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use frith_shared::types::{
    ClientId, ClientLedgerId, MatterId, OrganizationId, StatementImportId, TrustAccountId,
    TrustTransactionId, UserId,
};
use frith_shared::{Currency, Money, MoneyError};

/// Regulatory flavour of a trust account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustAccountType {
    /// Pooled Interest on Lawyers' Trust Account.
    Iolta,
    /// Dedicated trust account for a single client.
    ClientTrust,
    /// Escrow account.
    Escrow,
}

impl TrustAccountType {
    /// Returns the string representation of the account type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Iolta => "iolta",
            Self::ClientTrust => "client_trust",
            Self::Escrow => "escrow",
        }
    }

    /// Parses an account type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "iolta" => Some(Self::Iolta),
            "client_trust" => Some(Self::ClientTrust),
            "escrow" => Some(Self::Escrow),
            _ => None,
        }
    }
}

/// Lifecycle of a trust account or client ledger. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustStatus {
    /// Accepting postings.
    Active,
    /// Closed at zero balance.
    Closed,
}

impl TrustStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for TrustStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of trust transaction. The amount is always positive; the type
/// determines the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTransactionType {
    /// Client funds received.
    Deposit,
    /// Funds paid out on the client's behalf.
    Withdrawal,
    /// Funds moved out of this ledger (e.g., earned fees to operating).
    Transfer,
    /// Interest credited by the bank.
    Interest,
    /// Bank fee charged to the ledger.
    Fee,
}

/// Direction a posting moves a ledger balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceEffect {
    /// Balance goes up.
    Increase,
    /// Balance goes down.
    Decrease,
}

impl BalanceEffect {
    /// Returns the opposite direction.
    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::Increase => Self::Decrease,
            Self::Decrease => Self::Increase,
        }
    }
}

impl TrustTransactionType {
    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
            Self::Interest => "interest",
            Self::Fee => "fee",
        }
    }

    /// Parses a transaction type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(Self::Deposit),
            "withdrawal" => Some(Self::Withdrawal),
            "transfer" => Some(Self::Transfer),
            "interest" => Some(Self::Interest),
            "fee" => Some(Self::Fee),
            _ => None,
        }
    }

    /// Deposits and interest increase a balance; everything else decreases it.
    #[must_use]
    pub const fn effect(&self) -> BalanceEffect {
        match self {
            Self::Deposit | Self::Interest => BalanceEffect::Increase,
            Self::Withdrawal | Self::Transfer | Self::Fee => BalanceEffect::Decrease,
        }
    }
}

impl fmt::Display for TrustTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bank account holding client funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustAccount {
    /// Account ID.
    pub id: TrustAccountId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Display name.
    pub name: String,
    /// Bank holding the account.
    pub bank_name: String,
    /// Masked account number (last four digits).
    pub account_number_last4: Option<String>,
    /// Regulatory account type.
    pub account_type: TrustAccountType,
    /// Account currency; every ledger and posting uses it.
    pub currency: Currency,
    /// Lifecycle status.
    pub status: TrustStatus,
    /// Running total of all postings.
    pub book_balance: Money,
    /// Period end of the last approved reconciliation.
    pub last_reconciled_date: Option<NaiveDate>,
    /// Book balance at the last approved reconciliation.
    pub last_reconciled_balance: Option<Money>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TrustAccount {
    /// Returns true if the account accepts postings.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TrustStatus::Active
    }
}

/// Per-client sub-ledger of a trust account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLedger {
    /// Ledger ID.
    pub id: ClientLedgerId,
    /// Parent trust account.
    pub trust_account_id: TrustAccountId,
    /// Client whose funds the ledger tracks.
    pub client_id: ClientId,
    /// Optional matter scope.
    pub matter_id: Option<MatterId>,
    /// Display name.
    pub name: String,
    /// Running balance; never negative.
    pub balance: Money,
    /// Lifecycle status.
    pub status: TrustStatus,
    /// Incremented on every posting.
    pub version: i64,
    /// Time of the last posting.
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ClientLedger {
    /// Returns true if the ledger accepts postings.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TrustStatus::Active
    }
}

/// Audit record of a transaction being matched to a bank statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clearance {
    /// Statement import that cleared the transaction.
    pub statement_import_id: StatementImportId,
    /// Last day covered by that statement.
    pub statement_period_end: NaiveDate,
    /// Who cleared it.
    pub cleared_by: UserId,
    /// When it was cleared.
    pub cleared_at: DateTime<Utc>,
}

/// An immutable entry against one client ledger.
///
/// Only `clearance` is ever set after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustTransaction {
    /// Transaction ID.
    pub id: TrustTransactionId,
    /// Trust account the ledger belongs to.
    pub trust_account_id: TrustAccountId,
    /// Ledger the posting applies to.
    pub client_ledger_id: ClientLedgerId,
    /// Transaction type.
    pub transaction_type: TrustTransactionType,
    /// Always positive.
    pub amount: Money,
    /// Ledger balance right after this posting.
    pub balance_after: Money,
    /// Description.
    pub description: String,
    /// Value date.
    pub transaction_date: NaiveDate,
    /// Check number, wire reference, etc.
    pub reference: Option<String>,
    /// Set when this entry reverses an earlier one.
    pub reversal_of: Option<TrustTransactionId>,
    /// Who recorded it.
    pub created_by: UserId,
    /// When it was recorded.
    pub created_at: DateTime<Utc>,
    /// Statement match, once cleared.
    pub clearance: Option<Clearance>,
}

impl TrustTransaction {
    /// Direction of this posting. Reversals invert the type's usual effect.
    #[must_use]
    pub const fn effect(&self) -> BalanceEffect {
        let base = self.transaction_type.effect();
        if self.reversal_of.is_some() {
            base.inverse()
        } else {
            base
        }
    }

    /// Amount with sign: positive for increases, negative for decreases.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` only for unrepresentable amounts.
    pub fn signed_amount(&self) -> Result<Money, MoneyError> {
        match self.effect() {
            BalanceEffect::Increase => Ok(self.amount),
            BalanceEffect::Decrease => self.amount.negate(),
        }
    }

    /// Returns true once matched to a bank statement.
    #[must_use]
    pub const fn is_cleared(&self) -> bool {
        self.clearance.is_some()
    }

    /// True if this transaction appears on a statement ending on or before
    /// `period_end`.
    #[must_use]
    pub fn is_reflected_by(&self, period_end: NaiveDate) -> bool {
        self.clearance
            .as_ref()
            .is_some_and(|c| c.statement_period_end <= period_end)
    }
}

/// Input for opening a trust account.
#[derive(Debug, Clone)]
pub struct CreateTrustAccountInput {
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Display name.
    pub name: String,
    /// Bank name.
    pub bank_name: String,
    /// Masked account number.
    pub account_number_last4: Option<String>,
    /// Account type.
    pub account_type: TrustAccountType,
    /// Currency.
    pub currency: Currency,
}

/// Input for opening a client ledger.
#[derive(Debug, Clone)]
pub struct OpenLedgerInput {
    /// Client.
    pub client_id: ClientId,
    /// Optional matter.
    pub matter_id: Option<MatterId>,
    /// Display name.
    pub name: String,
}

/// Input for recording a trust transaction.
#[derive(Debug, Clone)]
pub struct RecordTransactionInput {
    /// Transaction type.
    pub transaction_type: TrustTransactionType,
    /// Positive amount in the ledger's currency.
    pub amount: Money,
    /// Description.
    pub description: String,
    /// Value date.
    pub transaction_date: NaiveDate,
    /// Optional reference.
    pub reference: Option<String>,
    /// Who is recording it.
    pub created_by: UserId,
}

/// The complete state change produced by one posting.
///
/// The transaction row, the ledger and the account must be persisted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// New transaction record.
    pub transaction: TrustTransaction,
    /// Ledger with updated balance, version, and activity time.
    pub ledger: ClientLedger,
    /// Account with updated book balance.
    pub account: TrustAccount,
}

/// Replay of a ledger's transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replay {
    /// Sum of signed amounts.
    pub balance: Money,
    /// Lowest running balance over every prefix (zero for an empty history).
    pub lowest_balance: Money,
}

/// A ledger whose stored balance disagrees with its transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDrift {
    /// Ledger.
    pub client_ledger_id: ClientLedgerId,
    /// Balance stored on the ledger row.
    pub stored_balance: Money,
    /// Balance obtained by replaying transactions.
    pub replayed_balance: Money,
}

/// Result of the cross-ledger integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Account checked.
    pub trust_account_id: TrustAccountId,
    /// Stored book balance.
    pub book_balance: Money,
    /// Sum of active ledger balances.
    pub ledger_total: Money,
    /// `book_balance - ledger_total`.
    pub difference: Money,
    /// Ledgers whose history does not replay to their stored balance.
    pub drift: Vec<LedgerDrift>,
    /// True when there is no difference and no drift.
    pub is_consistent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_effects() {
        assert_eq!(TrustTransactionType::Deposit.effect(), BalanceEffect::Increase);
        assert_eq!(TrustTransactionType::Interest.effect(), BalanceEffect::Increase);
        assert_eq!(TrustTransactionType::Withdrawal.effect(), BalanceEffect::Decrease);
        assert_eq!(TrustTransactionType::Transfer.effect(), BalanceEffect::Decrease);
        assert_eq!(TrustTransactionType::Fee.effect(), BalanceEffect::Decrease);
    }

    #[test]
    fn test_type_round_trip_strings() {
        for t in [
            TrustTransactionType::Deposit,
            TrustTransactionType::Withdrawal,
            TrustTransactionType::Transfer,
            TrustTransactionType::Interest,
            TrustTransactionType::Fee,
        ] {
            assert_eq!(TrustTransactionType::parse(t.as_str()), Some(t));
        }
        assert_eq!(TrustTransactionType::parse("refund"), None);
        assert_eq!(TrustAccountType::parse("IOLTA"), Some(TrustAccountType::Iolta));
        assert_eq!(TrustStatus::parse("closed"), Some(TrustStatus::Closed));
    }
}
