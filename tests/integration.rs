//! Integration tests for the ledger core.
//!
//! Covers the CSV E2E flow (operations in, account state out), transfer
//! invariants (conservation, non-negativity, fixed validation order),
//! atomicity under an injected journal fault, and serialization of
//! concurrent transfers over shared accounts.
use std::sync::Arc;
use std::thread;

use banking_core::{
    AccountId, AccountKind, Currency, Dispatcher, JournalError, LedgerEngine, Transfer,
    TransferEntry, TransferError, TransferId, TransferJournal, UserId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::io::Cursor;

/// Account row as exported by `Dispatcher::export_accounts`
#[derive(Debug, Deserialize)]
struct ExportedAccount {
    account: u64,
    owner: u64,
    kind: String,
    currency: String,
    balance: Decimal,
}

/// Helper to run an operations CSV through the dispatcher and get output
fn process_csv(input: &str) -> String {
    let mut dispatcher = Dispatcher::new();
    let reader = Cursor::new(input);
    dispatcher.process_operations(reader).unwrap();

    let mut output = Vec::new();
    dispatcher.export_accounts(&mut output).unwrap();
    String::from_utf8(output).unwrap()
}

fn parse_output(output: &str) -> Vec<ExportedAccount> {
    let mut rdr = csv::Reader::from_reader(output.as_bytes());
    rdr.deserialize::<ExportedAccount>()
        .map(|r| r.unwrap())
        .collect()
}

fn usd() -> Currency {
    "USD".parse().unwrap()
}

/// Engine with accounts A (USD 1000.00) and B (USD 500.00), both owned by
/// user 1
fn engine_with_pair() -> (LedgerEngine, AccountId, AccountId) {
    let engine = LedgerEngine::new();
    let a = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(1000.00))
        .unwrap();
    let b = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(500.00))
        .unwrap();
    (engine, a.id(), b.id())
}

// ============================================================================
// CSV end-to-end
// ============================================================================

#[test]
fn test_open_and_transfer_via_csv() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,USD,1000.00
open,1,,,savings,USD,500.00
transfer,1,1,2,,,200.00";

    let output = process_csv(input);
    let accounts = parse_output(&output);

    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].account, 1);
    assert_eq!(accounts[0].owner, 1);
    assert_eq!(accounts[0].kind, "checking");
    assert_eq!(accounts[0].currency, "USD");
    assert_eq!(accounts[0].balance, dec!(800.00));
    assert_eq!(accounts[1].kind, "savings");
    assert_eq!(accounts[1].balance, dec!(700.00));
}

#[test]
fn test_open_defaults_to_zero_balance() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,USD,";

    let output = process_csv(input);
    let accounts = parse_output(&output);

    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].balance, dec!(0));
}

#[test]
fn test_currency_is_uppercased_on_open() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,usd,10.00";

    let output = process_csv(input);
    let accounts = parse_output(&output);
    assert_eq!(accounts[0].currency, "USD");
}

#[test]
fn test_rejected_transfer_is_skipped_and_balances_unchanged() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,USD,100.00
open,1,,,checking,USD,500.00
transfer,1,1,2,,,200.00";

    let output = process_csv(input);
    let accounts = parse_output(&output);

    // Insufficient balance: the transfer row is skipped
    assert_eq!(accounts[0].balance, dec!(100.00));
    assert_eq!(accounts[1].balance, dec!(500.00));
}

#[test]
fn test_unowned_source_is_skipped() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,USD,100.00
open,2,,,checking,USD,100.00
transfer,2,1,2,,,50.00";

    let output = process_csv(input);
    let accounts = parse_output(&output);

    assert_eq!(accounts[0].balance, dec!(100.00));
    assert_eq!(accounts[1].balance, dec!(100.00));
}

#[test]
fn test_export_transfers_lists_committed_only() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,USD,100.00
open,1,,,checking,USD,0.00
transfer,1,1,2,,,60.00
transfer,1,1,2,,,60.00";

    let mut dispatcher = Dispatcher::new();
    dispatcher.process_operations(Cursor::new(input)).unwrap();

    // Second transfer exceeds the remaining 40.00 and is skipped
    let mut output = Vec::new();
    dispatcher.export_transfers(&mut output).unwrap();
    let output = String::from_utf8(output).unwrap();

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2); // header + one committed transfer
    assert_eq!(lines[0], "transfer,source,destination,amount");
    assert_eq!(lines[1], "1,1,2,60.00");
}

#[test]
fn test_whitespace_handling() {
    let input = "op,  user,  account,  to,  kind,  currency,  amount
open,  1,  ,  ,  checking,  USD,  100.00";

    let output = process_csv(input);
    let accounts = parse_output(&output);
    assert_eq!(accounts[0].balance, dec!(100.00));
}

// ============================================================================
// Invalid Input Tests - These should cause hard errors
// ============================================================================

/// Helper that returns Result to test error cases
fn try_process_csv(input: &str) -> Result<String, Box<dyn std::error::Error>> {
    let mut dispatcher = Dispatcher::new();
    let reader = Cursor::new(input);
    dispatcher.process_operations(reader)?;

    let mut output = Vec::new();
    dispatcher.export_accounts(&mut output)?;
    Ok(String::from_utf8(output)?)
}

#[test]
fn test_rejects_negative_transfer_amount() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,USD,100.00
open,1,,,checking,USD,100.00
transfer,1,1,2,,,-50.00";

    assert!(try_process_csv(input).is_err());
}

#[test]
fn test_rejects_zero_transfer_amount() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,USD,100.00
open,1,,,checking,USD,100.00
transfer,1,1,2,,,0";

    assert!(try_process_csv(input).is_err());
}

#[test]
fn test_rejects_more_than_2_decimals() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,USD,100.00
open,1,,,checking,USD,100.00
transfer,1,1,2,,,1.234";

    assert!(try_process_csv(input).is_err());
}

#[test]
fn test_rejects_open_with_bad_currency() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,DOLLARS,100.00";

    assert!(try_process_csv(input).is_err());
}

#[test]
fn test_rejects_transfer_without_destination() {
    let input = "op,user,account,to,kind,currency,amount
open,1,,,checking,USD,100.00
transfer,1,1,,,,50.00";

    assert!(try_process_csv(input).is_err());
}

#[test]
fn test_accepts_valid_amount_variants() {
    // All of these should be valid
    let inputs = [
        "op,user,account,to,kind,currency,amount\nopen,1,,,checking,USD,100",
        "op,user,account,to,kind,currency,amount\nopen,1,,,checking,USD,100.0",
        "op,user,account,to,kind,currency,amount\nopen,1,,,checking,USD,100.00",
        "op,user,account,to,kind,currency,amount\nopen,1,,,checking,USD,0.01",
    ];

    for input in inputs {
        assert!(try_process_csv(input).is_ok(), "Should accept: {input}");
    }
}

// ============================================================================
// Transfer invariants
// ============================================================================

#[test]
fn test_committed_transfer_conserves_money() {
    let (engine, a, b) = engine_with_pair();

    let before_a = engine.account(a).unwrap().balance();
    let before_b = engine.account(b).unwrap().balance();

    engine
        .execute_transfer(UserId(1), a, b, dec!(200.00))
        .unwrap();

    let after_a = engine.account(a).unwrap().balance();
    let after_b = engine.account(b).unwrap().balance();

    assert_eq!(after_a, before_a - dec!(200.00));
    assert_eq!(after_b, before_b + dec!(200.00));
    assert_eq!(after_a + after_b, before_a + before_b);
}

#[test]
fn test_insufficient_funds_leaves_balances_unchanged() {
    let engine = LedgerEngine::new();
    let a = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(100.00))
        .unwrap();
    let b = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(0))
        .unwrap();

    let err = engine
        .execute_transfer(UserId(1), a.id(), b.id(), dec!(200.00))
        .unwrap_err();

    assert!(matches!(err, TransferError::InsufficientBalance { .. }));
    assert_eq!(engine.account(a.id()).unwrap().balance(), dec!(100.00));
    assert_eq!(engine.account(b.id()).unwrap().balance(), dec!(0));
    assert!(engine.journal().is_empty());
}

#[test]
fn test_currency_mismatch_rejected() {
    let engine = LedgerEngine::new();
    let a = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(100.00))
        .unwrap();
    let b = engine
        .open_account(UserId(1), AccountKind::Checking, "EUR".parse().unwrap(), dec!(0))
        .unwrap();

    let err = engine
        .execute_transfer(UserId(1), a.id(), b.id(), dec!(100.00))
        .unwrap_err();
    assert!(matches!(err, TransferError::CurrencyMismatch { .. }));
    assert_eq!(engine.account(a.id()).unwrap().balance(), dec!(100.00));
}

#[test]
fn test_transfer_to_same_account_rejected() {
    let (engine, a, _) = engine_with_pair();

    let err = engine
        .execute_transfer(UserId(1), a, a, dec!(100.00))
        .unwrap_err();
    assert!(matches!(err, TransferError::SameAccount(id) if id == a));
}

#[test]
fn test_foreign_requestor_rejected() {
    let (engine, a, b) = engine_with_pair();

    let err = engine
        .execute_transfer(UserId(9), a, b, dec!(100.00))
        .unwrap_err();
    assert!(matches!(err, TransferError::NotOwner { user: UserId(9), .. }));
    assert_eq!(engine.account(a).unwrap().balance(), dec!(1000.00));
    assert_eq!(engine.account(b).unwrap().balance(), dec!(500.00));
}

#[test]
fn test_validation_order_is_deterministic() {
    // Requestor 9 owns neither account, the currencies differ, the amount
    // is invalid and the accounts are the same. The earliest check in the
    // fixed order (ownership) determines the error.
    let engine = LedgerEngine::new();
    let a = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(10.00))
        .unwrap();

    let err = engine
        .execute_transfer(UserId(9), a.id(), a.id(), dec!(-1))
        .unwrap_err();
    assert!(matches!(err, TransferError::NotOwner { .. }));

    // With a valid owner, the missing destination is next in line.
    let err = engine
        .execute_transfer(UserId(1), a.id(), AccountId(42), dec!(-1))
        .unwrap_err();
    assert!(matches!(err, TransferError::DestinationNotFound(AccountId(42))));
}

// ============================================================================
// Atomicity under storage failure
// ============================================================================

/// Journal whose appends always fail without writing, simulating a storage
/// fault at the commit point.
#[derive(Debug, Default)]
struct FailingJournal;

impl TransferJournal for FailingJournal {
    fn append(&self, _entry: TransferEntry) -> Result<Transfer, JournalError> {
        Err(JournalError::Backend("disk unplugged".to_owned()))
    }

    fn get(&self, _id: TransferId) -> Option<Transfer> {
        None
    }

    fn involving(&self, _account: AccountId) -> Vec<Transfer> {
        Vec::new()
    }
}

#[test]
fn test_failed_commit_leaves_no_partial_state() {
    let engine = LedgerEngine::with_journal(FailingJournal);
    let a = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(1000.00))
        .unwrap();
    let b = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(500.00))
        .unwrap();

    let err = engine
        .execute_transfer(UserId(1), a.id(), b.id(), dec!(200.00))
        .unwrap_err();

    assert!(matches!(err, TransferError::Storage(_)));
    assert_eq!(engine.account(a.id()).unwrap().balance(), dec!(1000.00));
    assert_eq!(engine.account(b.id()).unwrap().balance(), dec!(500.00));
    assert!(engine.transfers_for(a.id()).is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_transfers_cannot_overdraw() {
    // Two concurrent 600.00 transfers from an account holding 1000.00:
    // exactly one commits, the other fails with InsufficientBalance.
    let engine = Arc::new(LedgerEngine::new());
    let a = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(1000.00))
        .unwrap();
    let b = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(0))
        .unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let (a, b) = (a.id(), b.id());
            thread::spawn(move || engine.execute_transfer(UserId(1), a, b, dec!(600.00)))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(TransferError::InsufficientBalance { .. })))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(insufficient, 1);
    assert_eq!(engine.account(a.id()).unwrap().balance(), dec!(400.00));
    assert_eq!(engine.account(b.id()).unwrap().balance(), dec!(600.00));
}

#[test]
fn test_concurrent_debits_commit_exactly_what_the_balance_supports() {
    // Ten concurrent 30.00 debits against 100.00: exactly three fit.
    let engine = Arc::new(LedgerEngine::new());
    let source = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(100.00))
        .unwrap();
    let sink = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(0))
        .unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let (s, d) = (source.id(), sink.id());
            thread::spawn(move || engine.execute_transfer(UserId(1), s, d, dec!(30.00)))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();

    assert_eq!(successes, 3);
    assert!(results.iter().all(|r| match r {
        Ok(_) => true,
        Err(TransferError::InsufficientBalance { .. }) => true,
        Err(other) => panic!("unexpected error: {other}"),
    }));

    let source_balance = engine.account(source.id()).unwrap().balance();
    let sink_balance = engine.account(sink.id()).unwrap().balance();
    assert_eq!(source_balance, dec!(10.00));
    assert_eq!(sink_balance, dec!(90.00));
    assert!(source_balance >= Decimal::ZERO);
    assert_eq!(engine.journal().len(), 3);
}

#[test]
fn test_opposite_direction_transfers_do_not_deadlock() {
    // Two threads hammer the same account pair in opposite directions. With
    // ascending-id hold acquisition this completes; locking source-first
    // would deadlock here.
    let engine = Arc::new(LedgerEngine::new());
    let a = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(10000.00))
        .unwrap();
    let b = engine
        .open_account(UserId(1), AccountKind::Checking, usd(), dec!(10000.00))
        .unwrap();

    let forward = {
        let engine = Arc::clone(&engine);
        let (a, b) = (a.id(), b.id());
        thread::spawn(move || {
            for _ in 0..200 {
                let _ = engine.execute_transfer(UserId(1), a, b, dec!(1.00));
            }
        })
    };
    let backward = {
        let engine = Arc::clone(&engine);
        let (a, b) = (a.id(), b.id());
        thread::spawn(move || {
            for _ in 0..200 {
                let _ = engine.execute_transfer(UserId(1), b, a, dec!(1.00));
            }
        })
    };

    forward.join().unwrap();
    backward.join().unwrap();

    let balance_a = engine.account(a.id()).unwrap().balance();
    let balance_b = engine.account(b.id()).unwrap().balance();
    assert_eq!(balance_a + balance_b, dec!(20000.00));
    assert!(balance_a >= Decimal::ZERO);
    assert!(balance_b >= Decimal::ZERO);
}

#[test]
fn test_disjoint_pairs_proceed_independently() {
    let engine = Arc::new(LedgerEngine::new());
    let mut ids = Vec::new();
    for _ in 0..4 {
        let account = engine
            .open_account(UserId(1), AccountKind::Checking, usd(), dec!(100.00))
            .unwrap();
        ids.push(account.id());
    }

    let first = {
        let engine = Arc::clone(&engine);
        let (s, d) = (ids[0], ids[1]);
        thread::spawn(move || engine.execute_transfer(UserId(1), s, d, dec!(50.00)))
    };
    let second = {
        let engine = Arc::clone(&engine);
        let (s, d) = (ids[2], ids[3]);
        thread::spawn(move || engine.execute_transfer(UserId(1), s, d, dec!(50.00)))
    };

    assert!(first.join().unwrap().is_ok());
    assert!(second.join().unwrap().is_ok());
    assert_eq!(engine.account(ids[1]).unwrap().balance(), dec!(150.00));
    assert_eq!(engine.account(ids[3]).unwrap().balance(), dec!(150.00));
}

// ============================================================================
// History
// ============================================================================

#[test]
fn test_history_lists_both_legs() {
    let (engine, a, b) = engine_with_pair();

    engine.execute_transfer(UserId(1), a, b, dec!(10.00)).unwrap();
    engine.execute_transfer(UserId(1), b, a, dec!(5.00)).unwrap();

    let history_a = engine.transfers_for(a);
    assert_eq!(history_a.len(), 2);
    assert_eq!(history_a[0].amount(), dec!(10.00));
    assert_eq!(history_a[1].amount(), dec!(5.00));

    let fetched = engine.journal().get(history_a[0].id()).unwrap();
    assert_eq!(fetched.source(), a);
    assert_eq!(fetched.destination(), b);
}
