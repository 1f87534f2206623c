//! Ledger module.
//!
//! This module contains the core banking ledger logic including:
//! - `LedgerEngine` - Transfer validation and atomic application
//! - `InMemoryStore` - Account storage with per-record exclusive holds
//! - `TransferJournal` - Append-only record of committed transfers
//! - `Dispatcher` - CSV operation batch surface
//! - `Error` types - Validation, contention, and storage errors

mod account;
mod dispatch;
mod error;
mod journal;
mod ledger_engine;
mod operation;
mod store;

pub(crate) use rust_decimal::Decimal;

pub use account::{Account, AccountId, AccountKind, Currency, CurrencyError, UserId};
pub use dispatch::Dispatcher;
pub use error::{Error, JournalError, OpError, StoreError, TransferError};
pub use journal::{InMemoryJournal, Transfer, TransferEntry, TransferId, TransferJournal};
pub use ledger_engine::LedgerEngine;
pub use operation::{OpRecord, OpType, OpenAccount, Operation, TransferRequest};
pub use store::{AccountHold, AccountRef, InMemoryStore};
