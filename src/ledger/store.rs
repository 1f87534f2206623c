use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};

use super::account::{Account, AccountId, AccountKind, Currency, UserId};
use super::error::StoreError;
use super::Decimal;

/// The durable record behind one account.
///
/// Everything but the balance is immutable after creation and readable
/// without coordination; the balance is the single shared mutable field
/// and only changes through an `AccountHold`.
#[derive(Debug)]
struct AccountRecord {
    id: AccountId,
    owner: UserId,
    kind: AccountKind,
    currency: Currency,
    created_at: DateTime<Utc>,
    balance: Mutex<Decimal>,
}

impl AccountRecord {
    fn snapshot(&self) -> Account {
        Account::new(
            self.id,
            self.owner,
            self.kind,
            self.currency,
            *self.balance.lock(),
            self.created_at,
        )
    }
}

/// Keyed in-memory account storage with per-record exclusive holds.
///
/// Each record carries its own balance lock; holding one serializes every
/// conflicting transfer on that account for the duration of the atomic
/// unit. The outer map lock is only taken briefly for lookups and inserts,
/// never across a hold acquisition.
#[derive(Debug)]
pub struct InMemoryStore {
    accounts: RwLock<BTreeMap<AccountId, Arc<AccountRecord>>>,
    next_id: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new account with an initial deposit.
    ///
    /// The initial balance must be non-negative with at most 2 decimal
    /// places; ids are assigned sequentially starting at 1.
    pub fn create(
        &self,
        owner: UserId,
        kind: AccountKind,
        currency: Currency,
        initial_balance: Decimal,
    ) -> Result<Account, StoreError> {
        if initial_balance < Decimal::ZERO || initial_balance.scale() > 2 {
            return Err(StoreError::InvalidInitialBalance(initial_balance));
        }

        let id = AccountId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = Arc::new(AccountRecord {
            id,
            owner,
            kind,
            currency,
            created_at: Utc::now(),
            balance: Mutex::new(initial_balance),
        });
        let snapshot = record.snapshot();

        self.accounts.write().insert(id, record);

        log::debug!("[store] created account {id} for user {owner} ({kind}, {currency})");
        Ok(snapshot)
    }

    /// Snapshot read of a single account.
    ///
    /// The balance read waits behind any in-flight atomic unit on the same
    /// record, so it is never stale.
    pub fn get(&self, id: AccountId) -> Result<Account, StoreError> {
        Ok(self.record(id)?.read())
    }

    /// Resolve an account for update.
    ///
    /// Resolution only proves existence; the exclusive hold itself is
    /// acquired with [`AccountRef::hold`], so a caller locking two accounts
    /// can order the acquisitions after resolving both.
    pub fn get_for_update(&self, id: AccountId) -> Result<AccountRef, StoreError> {
        self.record(id)
    }

    /// Snapshots of all accounts, in ascending id order.
    pub fn accounts(&self) -> Vec<Account> {
        let accounts = self.accounts.read();
        accounts.values().map(|record| record.snapshot()).collect()
    }

    /// Snapshots of all accounts owned by `owner`, in ascending id order.
    pub fn accounts_of(&self, owner: UserId) -> Vec<Account> {
        let accounts = self.accounts.read();
        accounts
            .values()
            .filter(|record| record.owner == owner)
            .map(|record| record.snapshot())
            .collect()
    }

    /// Returns the number of accounts in the store
    pub fn account_count(&self) -> usize {
        self.accounts.read().len()
    }

    fn record(&self, id: AccountId) -> Result<AccountRef, StoreError> {
        let accounts = self.accounts.read();
        let inner = accounts.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(AccountRef {
            inner: Arc::clone(inner),
        })
    }
}

/// A resolved reference to a stored account, ready to be held.
///
/// The identity fields are immutable and readable without taking the hold.
#[derive(Debug)]
pub struct AccountRef {
    inner: Arc<AccountRecord>,
}

impl AccountRef {
    /// Returns the account ID
    pub fn id(&self) -> AccountId {
        self.inner.id
    }

    /// Returns the owning user's ID
    pub fn owner(&self) -> UserId {
        self.inner.owner
    }

    /// Returns the account currency
    pub fn currency(&self) -> Currency {
        self.inner.currency
    }

    /// Snapshot read without taking a lasting hold.
    pub fn read(&self) -> Account {
        self.inner.snapshot()
    }

    /// Acquire the exclusive hold on this record, waiting at most `wait`.
    ///
    /// The hold lasts until the returned guard is dropped; no other hold or
    /// balance mutation on the same account can proceed in between.
    pub fn hold(&self, wait: Duration) -> Result<AccountHold<'_>, StoreError> {
        let guard = self
            .inner
            .balance
            .try_lock_for(wait)
            .ok_or(StoreError::HoldTimeout(self.inner.id))?;
        log::trace!("[store] hold acquired on account {}", self.inner.id);
        Ok(AccountHold {
            id: self.inner.id,
            guard,
        })
    }
}

/// An exclusive hold on one account's balance, scoped to one atomic unit.
#[derive(Debug)]
pub struct AccountHold<'a> {
    id: AccountId,
    guard: MutexGuard<'a, Decimal>,
}

impl AccountHold<'_> {
    /// Returns the account ID
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Returns the balance as of this hold
    pub fn balance(&self) -> Decimal {
        *self.guard
    }

    /// Add `delta` (positive or negative) to the held balance.
    ///
    /// The caller must have validated `balance + delta >= 0` inside the
    /// same atomic unit.
    ///
    /// # Panics (debug only)
    /// Panics if the resulting balance would be negative.
    pub fn apply_delta(&mut self, delta: Decimal) {
        debug_assert!(
            *self.guard + delta >= Decimal::ZERO,
            "Invariant violated: balance ({}) + delta ({}) is negative on account {}",
            *self.guard,
            delta,
            self.id
        );
        *self.guard += delta;
        log::trace!(
            "[store] account {} delta {} -> new_balance={}",
            self.id,
            delta,
            *self.guard
        );
    }
}
