//! A small core-banking ledger engine.
//!
//! Accounts hold exact-decimal balances in a single currency; the
//! [`LedgerEngine`] validates and atomically applies transfers between
//! them so that money is conserved, balances never go negative, and
//! concurrent transfers over shared accounts cannot double-spend. The
//! [`Dispatcher`] drives the engine from an operations CSV and exports
//! final state as CSV.

mod ledger;

pub use ledger::{
    Account, AccountHold, AccountId, AccountKind, AccountRef, Currency, CurrencyError, Dispatcher,
    Error, InMemoryJournal, InMemoryStore, JournalError, LedgerEngine, OpError, OpRecord, OpType,
    OpenAccount, Operation, StoreError, Transfer, TransferEntry, TransferError, TransferId,
    TransferJournal, TransferRequest, UserId,
};
