//! Trust compliance checks.
//!
//! Scans accounts and their ledgers for conditions a bar auditor would flag:
//! negative client balances, book/ledger mismatches that suggest commingling,
//! dormant funded ledgers, and overdue reconciliations.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use frith_shared::config::TrustConfig;
use frith_shared::types::{ClientLedgerId, TrustAccountId};
use frith_shared::Money;

use super::error::TrustError;
use super::service::TrustLedgerEngine;
use super::types::{ClientLedger, TrustAccount};

/// Kind of compliance finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A client ledger is below zero.
    NegativeBalance,
    /// Book balance differs from the sum of client ledgers.
    Commingling,
    /// A funded ledger has had no activity for too long.
    Dormant,
    /// The account has not been reconciled recently.
    MissingReconciliation,
}

/// Severity of a compliance finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Needs attention.
    Warning,
    /// Needs attention now.
    Critical,
}

/// A single compliance finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceAlert {
    /// What was found.
    pub kind: AlertKind,
    /// How bad it is.
    pub severity: AlertSeverity,
    /// Account concerned.
    pub trust_account_id: TrustAccountId,
    /// Ledger concerned, if the finding is ledger-specific.
    pub client_ledger_id: Option<ClientLedgerId>,
    /// Amount involved, if any.
    pub amount: Option<Money>,
    /// Human-readable description.
    pub message: String,
}

/// Thresholds for time-based checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceThresholds {
    /// Days without activity before a funded ledger is dormant.
    pub dormant_after_days: u32,
    /// Maximum days since the last approved reconciliation.
    pub reconciliation_interval_days: u32,
}

impl Default for ComplianceThresholds {
    fn default() -> Self {
        Self::from(&TrustConfig::default())
    }
}

impl From<&TrustConfig> for ComplianceThresholds {
    fn from(config: &TrustConfig) -> Self {
        Self {
            dormant_after_days: config.dormant_after_days,
            reconciliation_interval_days: config.reconciliation_interval_days,
        }
    }
}

/// An account with every ledger under it.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    /// The account.
    pub account: TrustAccount,
    /// Its ledgers.
    pub ledgers: Vec<ClientLedger>,
}

/// Runs compliance checks over account snapshots.
pub struct ComplianceChecker;

impl ComplianceChecker {
    /// Runs every check over every active account.
    ///
    /// Alerts are ordered by account, then critical before warning.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Money` if ledger balances cannot be summed.
    pub fn run(
        snapshots: &[AccountSnapshot],
        thresholds: ComplianceThresholds,
        now: DateTime<Utc>,
    ) -> Result<Vec<ComplianceAlert>, TrustError> {
        let mut alerts = Vec::new();
        for snapshot in snapshots.iter().filter(|s| s.account.is_active()) {
            let mut account_alerts = Self::check_account(snapshot, thresholds, now)?;
            account_alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
            alerts.extend(account_alerts);
        }
        Ok(alerts)
    }

    fn check_account(
        snapshot: &AccountSnapshot,
        thresholds: ComplianceThresholds,
        now: DateTime<Utc>,
    ) -> Result<Vec<ComplianceAlert>, TrustError> {
        let account = &snapshot.account;
        let mut alerts = Vec::new();

        for ledger in &snapshot.ledgers {
            if ledger.balance.is_negative() {
                alerts.push(ComplianceAlert {
                    kind: AlertKind::NegativeBalance,
                    severity: AlertSeverity::Critical,
                    trust_account_id: account.id,
                    client_ledger_id: Some(ledger.id),
                    amount: Some(ledger.balance),
                    message: format!("Client ledger '{}' has a negative balance", ledger.name),
                });
            }
        }

        let ledger_total = TrustLedgerEngine::ledger_total(account.currency, &snapshot.ledgers)?;
        if ledger_total != account.book_balance {
            let difference = account.book_balance.subtract(&ledger_total)?;
            alerts.push(ComplianceAlert {
                kind: AlertKind::Commingling,
                severity: AlertSeverity::Critical,
                trust_account_id: account.id,
                client_ledger_id: None,
                amount: Some(difference),
                message: format!(
                    "Book balance {} does not match client ledgers {}",
                    account.book_balance, ledger_total
                ),
            });
        }

        let dormant_cutoff = now - Days::new(u64::from(thresholds.dormant_after_days));
        for ledger in snapshot.ledgers.iter().filter(|l| l.is_active()) {
            let last_activity = ledger.last_activity_at.unwrap_or(ledger.created_at);
            if ledger.balance.is_positive() && last_activity < dormant_cutoff {
                alerts.push(ComplianceAlert {
                    kind: AlertKind::Dormant,
                    severity: AlertSeverity::Warning,
                    trust_account_id: account.id,
                    client_ledger_id: Some(ledger.id),
                    amount: Some(ledger.balance),
                    message: format!(
                        "Client ledger '{}' has had no activity since {}",
                        ledger.name,
                        last_activity.date_naive()
                    ),
                });
            }
        }

        let today = now.date_naive();
        if Self::reconciliation_overdue(account, thresholds, today) {
            alerts.push(ComplianceAlert {
                kind: AlertKind::MissingReconciliation,
                severity: AlertSeverity::Warning,
                trust_account_id: account.id,
                client_ledger_id: None,
                amount: None,
                message: account.last_reconciled_date.map_or_else(
                    || format!("Trust account '{}' has never been reconciled", account.name),
                    |date| {
                        format!(
                            "Trust account '{}' was last reconciled on {date}",
                            account.name
                        )
                    },
                ),
            });
        }

        Ok(alerts)
    }

    fn reconciliation_overdue(
        account: &TrustAccount,
        thresholds: ComplianceThresholds,
        today: NaiveDate,
    ) -> bool {
        let since = account
            .last_reconciled_date
            .unwrap_or_else(|| account.created_at.date_naive());
        since
            .checked_add_days(Days::new(u64::from(thresholds.reconciliation_interval_days)))
            .is_some_and(|deadline| today > deadline)
    }
}
