use crate::ledger::account::{AccountId, Currency, UserId};
use crate::ledger::operation::OpRecord;
use crate::ledger::Decimal;

/// Top-level error type for the batch dispatch surface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Operation error: {0}")]
    Operation(#[from] OpError),
}

/// Errors during `OpRecord` -> `Operation` conversion (hard errors).
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(OpRecord),
}

/// Errors raised by the account store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Account {0} not found")]
    NotFound(AccountId),

    #[error("Timed out waiting for exclusive hold on account {0}")]
    HoldTimeout(AccountId),

    #[error("Initial balance {0} must be non-negative with at most 2 decimal places")]
    InvalidInitialBalance(Decimal),
}

/// Errors raised by a transfer journal backend.
///
/// The in-memory journal never fails, but the trait admits durable
/// backends whose appends can; a failed append must leave no entry behind.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("Journal backend error: {0}")]
    Backend(String),
}

/// Rejections and failures of a single transfer request.
///
/// The variant reported for a request violating several checks at once is
/// fixed: checks run in the order the variants are declared here, and the
/// first failing check wins.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Source account {0} not found")]
    SourceNotFound(AccountId),

    #[error("User {user} does not own source account {account}")]
    NotOwner { user: UserId, account: AccountId },

    #[error("Destination account {0} not found")]
    DestinationNotFound(AccountId),

    #[error("Currency mismatch: {source_currency} != {destination}")]
    CurrencyMismatch {
        source_currency: Currency,
        destination: Currency,
    },

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Cannot transfer to the same account ({0})")]
    SameAccount(AccountId),

    #[error("Invalid amount {0}: must be positive with at most 2 decimal places")]
    InvalidAmount(Decimal),

    #[error("Account {0} is busy: timed out waiting for an exclusive hold")]
    Contention(AccountId),

    #[error("Transfer not committed: {0}")]
    Storage(#[from] JournalError),
}
