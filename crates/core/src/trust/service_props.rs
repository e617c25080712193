//! Property-based tests for TrustLedgerEngine.
//!
//! - Replay of accepted postings equals the stored balance and never dips
//!   below zero at any prefix
//! - Book balance equals the ledger total after any sequence of postings
//! - Rejected postings change nothing

use chrono::{DateTime, NaiveDate, Utc};
use proptest::prelude::*;

use frith_shared::types::{ClientId, OrganizationId, UserId};
use frith_shared::{Currency, Money};

use super::error::TrustError;
use super::service::TrustLedgerEngine;
use super::types::{
    ClientLedger, CreateTrustAccountInput, OpenLedgerInput, RecordTransactionInput, TrustAccount,
    TrustAccountType, TrustTransaction, TrustTransactionType,
};

/// Strategy to generate transaction types.
fn transaction_type() -> impl Strategy<Value = TrustTransactionType> {
    prop_oneof![
        Just(TrustTransactionType::Deposit),
        Just(TrustTransactionType::Withdrawal),
        Just(TrustTransactionType::Transfer),
        Just(TrustTransactionType::Interest),
        Just(TrustTransactionType::Fee),
    ]
}

/// Strategy to generate (ledger index, type, cents) operations.
fn operations(ledgers: usize) -> impl Strategy<Value = Vec<(usize, TrustTransactionType, i64)>> {
    prop::collection::vec((0..ledgers, transaction_type(), 1i64..500_000i64), 1..60)
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-04-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn setup(ledger_count: usize) -> (TrustAccount, Vec<ClientLedger>) {
    let account = TrustLedgerEngine::create_account(
        CreateTrustAccountInput {
            organization_id: OrganizationId::new(),
            name: "Trust".to_string(),
            bank_name: "Bank".to_string(),
            account_number_last4: None,
            account_type: TrustAccountType::Iolta,
            currency: Currency::USD,
        },
        now(),
    );
    let ledgers = (0..ledger_count)
        .map(|i| {
            TrustLedgerEngine::open_ledger(
                &account,
                OpenLedgerInput {
                    client_id: ClientId::new(),
                    matter_id: None,
                    name: format!("Client {i}"),
                },
                now(),
            )
            .unwrap()
        })
        .collect();
    (account, ledgers)
}

fn input(transaction_type: TrustTransactionType, cents: i64) -> RecordTransactionInput {
    RecordTransactionInput {
        transaction_type,
        amount: Money::from_minor(cents, Currency::USD),
        description: "prop".to_string(),
        transaction_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
        reference: None,
        created_by: UserId::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Accepted postings replay to the stored balance and every prefix is
    /// non-negative.
    #[test]
    fn prop_replay_matches_balance_and_never_negative(ops in operations(1)) {
        let (mut account, mut ledgers) = setup(1);
        let mut accepted: Vec<TrustTransaction> = Vec::new();

        for (_, t, cents) in ops {
            let ledger = &ledgers[0];
            match TrustLedgerEngine::record_transaction(&account, ledger, ledger.balance, input(t, cents), now()) {
                Ok(posting) => {
                    accepted.push(posting.transaction);
                    ledgers[0] = posting.ledger;
                    account = posting.account;
                }
                Err(TrustError::InsufficientTrustFunds { available, .. }) => {
                    prop_assert_eq!(available, ledgers[0].balance);
                }
                Err(e) => prop_assert!(false, "unexpected error: {e}"),
            }
        }

        let replay = TrustLedgerEngine::replay(Currency::USD, &accepted).unwrap();
        prop_assert_eq!(replay.balance, ledgers[0].balance);
        prop_assert!(!replay.lowest_balance.is_negative());
        for txn in &accepted {
            prop_assert!(!txn.balance_after.is_negative());
        }
    }

    /// Book balance equals the ledger total after every posting, accepted or not.
    #[test]
    fn prop_book_balance_equals_ledger_total(ops in operations(4)) {
        let (mut account, mut ledgers) = setup(4);

        for (idx, t, cents) in ops {
            let total = TrustLedgerEngine::ledger_total(Currency::USD, &ledgers).unwrap();
            let before = (account.book_balance, ledgers[idx].balance);

            match TrustLedgerEngine::record_transaction(&account, &ledgers[idx], total, input(t, cents), now()) {
                Ok(posting) => {
                    ledgers[idx] = posting.ledger;
                    account = posting.account;
                }
                Err(_) => {
                    prop_assert_eq!(before, (account.book_balance, ledgers[idx].balance));
                }
            }

            let total = TrustLedgerEngine::ledger_total(Currency::USD, &ledgers).unwrap();
            prop_assert_eq!(account.book_balance, total);
        }

        let report = TrustLedgerEngine::verify_trust_account_integrity(&account, &ledgers, &[]).unwrap();
        prop_assert!(report.difference.is_zero());
    }
}
