//! Integration tests for statement import, clearing and the reconciliation
//! workflow.
//!
//! Requires a running `PostgreSQL` database; tests skip when none is
//! reachable.

mod common;

use sea_orm::DatabaseConnection;

use frith_core::reconciliation::{
    Approver, NewStatementImport, ParsedStatementLine, ReconciliationError, ReconciliationStatus,
    RoleOverridePolicy, StatementFormat, StatementPeriod, parse_csv,
};
use frith_core::trust::{TrustAccount, TrustTransaction, TrustTransactionType};
use frith_db::{ReconciliationRepository, TrustRepository};
use frith_shared::Currency;
use frith_shared::types::{OrganizationId, UserId};

use common::{account_input, connect, date, ledger_input, organization, posting, usd};

struct Fixture {
    org: OrganizationId,
    user: UserId,
    account: TrustAccount,
    deposit: TrustTransaction,
    withdrawal: TrustTransaction,
}

/// One ledger: a 1,000.00 deposit on March 2nd and a 200.00 withdrawal on
/// March 10th. Book balance 800.00.
async fn fixture(db: &DatabaseConnection) -> Fixture {
    let trust = TrustRepository::new(db.clone());
    let org = organization(db).await;
    let user = UserId::new();
    let account = trust.create_account(account_input(org)).await.unwrap();
    let ledger = trust
        .open_ledger(org, account.id, ledger_input("Acme retainer"))
        .await
        .unwrap();
    let deposit = trust
        .record_transaction(
            org,
            ledger.id,
            posting(TrustTransactionType::Deposit, 100_000, date(2026, 3, 2), user),
        )
        .await
        .unwrap()
        .transaction;
    let withdrawal = trust
        .record_transaction(
            org,
            ledger.id,
            posting(TrustTransactionType::Withdrawal, 20_000, date(2026, 3, 10), user),
        )
        .await
        .unwrap();
    Fixture {
        org,
        user,
        account: withdrawal.account,
        deposit,
        withdrawal: withdrawal.transaction,
    }
}

fn march() -> StatementPeriod {
    StatementPeriod::new(date(2026, 3, 1), date(2026, 3, 31)).unwrap()
}

fn statement(user: UserId, closing: i64, lines: Vec<ParsedStatementLine>) -> NewStatementImport {
    NewStatementImport {
        period: march(),
        opening_balance: usd(0),
        closing_balance: usd(closing),
        format: StatementFormat::Csv,
        lines,
        imported_by: user,
    }
}

#[tokio::test]
async fn test_balanced_reconciliation_is_approved_and_stamped() {
    let Some(db) = connect().await else { return };
    let f = fixture(&db).await;
    let repo = ReconciliationRepository::new(db.clone());

    let csv = "Date,Description,Amount\n2026-03-02,Retainer deposit,1000.00\n";
    let lines = parse_csv(csv.as_bytes(), Currency::USD).unwrap();
    let imported = repo
        .import_statement(f.org, f.account.id, statement(f.user, 100_000, lines))
        .await
        .unwrap();
    assert_eq!(imported.lines.len(), 1);

    let stored = repo.get_statement(f.org, imported.id).await.unwrap();
    assert_eq!(stored.lines, imported.lines);
    assert_eq!(stored.closing_balance, usd(100_000));

    let cleared = repo
        .mark_cleared(f.org, imported.id, &[f.deposit.id], f.user)
        .await
        .unwrap();
    assert!(cleared[0].is_cleared());

    let rec = repo
        .reconcile(
            f.org,
            f.account.id,
            march(),
            usd(100_000),
            Some(imported.id),
            f.user,
        )
        .await
        .unwrap();
    assert!(rec.report.is_balanced, "{:?}", rec.report.discrepancies);
    assert_eq!(rec.status, ReconciliationStatus::Draft);
    assert_eq!(rec.report.outstanding_withdrawals, usd(20_000));
    assert_eq!(rec.report.adjusted_statement_balance, usd(80_000));
    assert_eq!(rec.report.cleared_balance, Some(usd(100_000)));
    assert_eq!(rec.report.outstanding_transaction_ids, vec![f.withdrawal.id]);

    repo.submit(f.org, rec.id, f.user).await.unwrap();
    let approver = Approver {
        user_id: UserId::new(),
        role: "admin".to_string(),
    };
    let approved = repo.approve(f.org, rec.id, &approver).await.unwrap();
    assert_eq!(approved.status, ReconciliationStatus::Approved);

    let account = TrustRepository::new(db.clone())
        .get_account(f.org, f.account.id)
        .await
        .unwrap();
    assert_eq!(account.last_reconciled_date, Some(date(2026, 3, 31)));
    assert_eq!(account.last_reconciled_balance, Some(usd(80_000)));

    let history = repo.list(f.org, f.account.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, rec.id);
}

#[tokio::test]
async fn test_clearing_is_all_or_nothing() {
    let Some(db) = connect().await else { return };
    let f = fixture(&db).await;
    let repo = ReconciliationRepository::new(db.clone());
    let imported = repo
        .import_statement(f.org, f.account.id, statement(f.user, 100_000, Vec::new()))
        .await
        .unwrap();

    let err = repo
        .mark_cleared(f.org, imported.id, &[f.deposit.id, f.deposit.id], f.user)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::AlreadyCleared(id) if id == f.deposit.id));

    // The failed batch left the deposit uncleared.
    repo.mark_cleared(f.org, imported.id, &[f.deposit.id], f.user)
        .await
        .unwrap();
    let err = repo
        .mark_cleared(f.org, imported.id, &[f.withdrawal.id, f.deposit.id], f.user)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::AlreadyCleared(_)));
}

#[tokio::test]
async fn test_unbalanced_run_needs_authorized_override() {
    let Some(db) = connect().await else { return };
    let f = fixture(&db).await;
    let repo = ReconciliationRepository::new(db.clone());
    let policy = RoleOverridePolicy::new(["owner", "admin"]);

    let rec = repo
        .reconcile(f.org, f.account.id, march(), usd(95_000), None, f.user)
        .await
        .unwrap();
    assert!(!rec.report.is_balanced);
    assert_eq!(rec.status, ReconciliationStatus::Flagged);

    let err = repo.submit(f.org, rec.id, f.user).await.unwrap_err();
    assert!(matches!(err, ReconciliationError::UnbalancedReconciliation(_)));

    let staff = Approver {
        user_id: UserId::new(),
        role: "staff".to_string(),
    };
    let err = repo
        .approve_with_override(f.org, rec.id, &staff, "Bank error", &policy)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::OverrideNotAuthorized(_)));

    let owner = Approver {
        user_id: UserId::new(),
        role: "owner".to_string(),
    };
    let err = repo
        .approve_with_override(f.org, rec.id, &owner, "   ", &policy)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::JustificationRequired));

    let approved = repo
        .approve_with_override(
            f.org,
            rec.id,
            &owner,
            "Bank posted a 50.00 fee in April",
            &policy,
        )
        .await
        .unwrap();
    assert_eq!(approved.status, ReconciliationStatus::Approved);
    assert_eq!(
        approved.override_justification.as_deref(),
        Some("Bank posted a 50.00 fee in April")
    );
    let stored = repo.get(f.org, rec.id).await.unwrap();
    assert_eq!(stored.status, ReconciliationStatus::Approved);
    assert_eq!(stored.approved_by, Some(owner.user_id));
    assert_eq!(stored.report, approved.report);
}
