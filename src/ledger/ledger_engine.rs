use std::time::Duration;

use chrono::Utc;

use super::account::{Account, AccountId, AccountKind, Currency, UserId};
use super::error::{StoreError, TransferError};
use super::journal::{InMemoryJournal, Transfer, TransferEntry, TransferJournal};
use super::store::{AccountHold, AccountRef, InMemoryStore};
use super::Decimal;

/// Bounded wait for an exclusive hold before a transfer fails with
/// `Contention` rather than blocking forever.
const DEFAULT_HOLD_TIMEOUT: Duration = Duration::from_secs(5);

/// The ledger core: validates transfer requests and applies them atomically.
///
/// Every balance mutation in the system goes through `execute_transfer` or
/// the account-creation deposit, so the engine is the single enforcement
/// point for conservation and non-negativity.
#[derive(Debug)]
pub struct LedgerEngine<J: TransferJournal = InMemoryJournal> {
    store: InMemoryStore,
    journal: J,
    hold_timeout: Duration,
}

impl LedgerEngine<InMemoryJournal> {
    /// Create a new `LedgerEngine` with empty accounts and journal
    pub fn new() -> Self {
        log::trace!("LedgerEngine initialized");
        Self::with_journal(InMemoryJournal::new())
    }
}

impl Default for LedgerEngine<InMemoryJournal> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J: TransferJournal> LedgerEngine<J> {
    /// Create an engine writing committed transfers to `journal`.
    pub fn with_journal(journal: J) -> Self {
        Self {
            store: InMemoryStore::new(),
            journal,
            hold_timeout: DEFAULT_HOLD_TIMEOUT,
        }
    }

    /// Override the bounded wait for per-account exclusive holds.
    pub fn with_hold_timeout(mut self, hold_timeout: Duration) -> Self {
        self.hold_timeout = hold_timeout;
        self
    }

    /// Returns the account store
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Returns the transfer journal
    pub fn journal(&self) -> &J {
        &self.journal
    }

    /// Open an account for `owner` with an initial deposit.
    pub fn open_account(
        &self,
        owner: UserId,
        kind: AccountKind,
        currency: Currency,
        initial_balance: Decimal,
    ) -> Result<Account, StoreError> {
        self.store.create(owner, kind, currency, initial_balance)
    }

    /// Snapshot of a single account.
    pub fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        self.store.get(id)
    }

    /// Committed transfers touching `account` on either leg.
    pub fn transfers_for(&self, account: AccountId) -> Vec<Transfer> {
        self.journal.involving(account)
    }

    /// Validate and atomically apply one transfer.
    ///
    /// Checks run in a fixed order and the first failure wins, so the error
    /// reported for a request violating several checks at once is part of
    /// the contract:
    /// 1. source exists, 2. requestor owns source, 3. destination exists,
    /// 4. currencies match, 5. balance covers the amount, 6. accounts
    /// differ, 7. amount is positive with at most 2 decimal places.
    ///
    /// On success the source balance drops by `amount`, the destination
    /// balance rises by `amount`, and the journal holds the new `Transfer`,
    /// all as one atomic unit. On any error nothing has changed.
    pub fn execute_transfer(
        &self,
        requestor: UserId,
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
    ) -> Result<Transfer, TransferError> {
        log::trace!(
            "[transfer] user={requestor} source={source} destination={destination} amount={amount}"
        );

        // Checks 1-4 touch only fields that are immutable after creation,
        // so they run before any hold is taken.
        let source_ref = self
            .store
            .get_for_update(source)
            .map_err(|_| TransferError::SourceNotFound(source))?;

        if source_ref.owner() != requestor {
            return Err(TransferError::NotOwner {
                user: requestor,
                account: source,
            });
        }

        let destination_ref = self
            .store
            .get_for_update(destination)
            .map_err(|_| TransferError::DestinationNotFound(destination))?;

        if source_ref.currency() != destination_ref.currency() {
            return Err(TransferError::CurrencyMismatch {
                source_currency: source_ref.currency(),
                destination: destination_ref.currency(),
            });
        }

        // Checks 5-7 and the application need the balances pinned. Holds are
        // acquired in ascending account-id order, whichever leg is the
        // source, so two transfers over the same pair can never deadlock.
        if source == destination {
            let hold = self.hold(&source_ref)?;
            self.check_balance(&hold, amount)?;
            return Err(TransferError::SameAccount(source));
        }

        let (mut source_hold, mut destination_hold) = if source < destination {
            let s = self.hold(&source_ref)?;
            let d = self.hold(&destination_ref)?;
            (s, d)
        } else {
            let d = self.hold(&destination_ref)?;
            let s = self.hold(&source_ref)?;
            (s, d)
        };

        self.check_balance(&source_hold, amount)?;

        if amount <= Decimal::ZERO || amount.scale() > 2 {
            return Err(TransferError::InvalidAmount(amount));
        }

        // Commit point: the journal append assigns the id. If it fails the
        // holds drop untouched and the request has no observable effect.
        let transfer = self.journal.append(TransferEntry {
            source,
            destination,
            amount,
            created_at: Utc::now(),
        })?;

        source_hold.apply_delta(-amount);
        destination_hold.apply_delta(amount);

        log::debug!(
            "[transfer] committed {}: {source} -> {destination} amount={amount} \
             source_balance={} destination_balance={}",
            transfer.id(),
            source_hold.balance(),
            destination_hold.balance(),
        );
        Ok(transfer)
    }

    fn hold<'a>(&self, record: &'a AccountRef) -> Result<AccountHold<'a>, TransferError> {
        record
            .hold(self.hold_timeout)
            .map_err(|_| TransferError::Contention(record.id()))
    }

    fn check_balance(&self, hold: &AccountHold<'_>, amount: Decimal) -> Result<(), TransferError> {
        if hold.balance() < amount {
            return Err(TransferError::InsufficientBalance {
                available: hold.balance(),
                requested: amount,
            });
        }
        Ok(())
    }
}
