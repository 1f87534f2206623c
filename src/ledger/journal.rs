use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::account::{serialize_decimal_2dp, AccountId};
use super::error::JournalError;
use super::Decimal;

/// Identifier of a committed transfer. Assigned by the journal at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub u64);

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A transfer validated and ready to commit, before the journal has
/// assigned it an identity.
#[derive(Debug, Clone)]
pub struct TransferEntry {
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A committed transfer. Immutable once written.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Transfer {
    #[serde(rename = "transfer")]
    id: TransferId,
    source: AccountId,
    destination: AccountId,
    #[serde(serialize_with = "serialize_decimal_2dp")]
    amount: Decimal,
    // Timestamps stay out of the CSV export
    #[serde(skip_serializing)]
    created_at: DateTime<Utc>,
}

impl Transfer {
    /// Returns the transfer ID
    pub fn id(&self) -> TransferId {
        self.id
    }

    /// Returns the source account ID
    pub fn source(&self) -> AccountId {
        self.source
    }

    /// Returns the destination account ID
    pub fn destination(&self) -> AccountId {
        self.destination
    }

    /// Returns the transferred amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the commit timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Append-only store of committed transfers.
///
/// `append` is the commit point of a transfer's atomic unit: it must either
/// write the full entry and return the assigned record, or fail leaving no
/// trace. Entries are never mutated after insertion.
pub trait TransferJournal {
    /// Assign an id to `entry` and write it. Insert-only.
    fn append(&self, entry: TransferEntry) -> Result<Transfer, JournalError>;

    /// Look up a committed transfer by id.
    fn get(&self, id: TransferId) -> Option<Transfer>;

    /// All committed transfers with `account` on either leg, in commit order.
    fn involving(&self, account: AccountId) -> Vec<Transfer>;
}

/// In-memory journal keyed by transfer id.
///
/// Concurrent appends coordinate only on the id counter and the map insert;
/// there is no cross-record locking to deadlock against.
#[derive(Debug)]
pub struct InMemoryJournal {
    entries: RwLock<BTreeMap<TransferId, Transfer>>,
    next_id: AtomicU64,
}

impl Default for InMemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the number of committed transfers
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no transfer has been committed
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshots of all committed transfers, in commit order.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.entries.read().values().cloned().collect()
    }
}

impl TransferJournal for InMemoryJournal {
    fn append(&self, entry: TransferEntry) -> Result<Transfer, JournalError> {
        let id = TransferId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let transfer = Transfer {
            id,
            source: entry.source,
            destination: entry.destination,
            amount: entry.amount,
            created_at: entry.created_at,
        };

        self.entries.write().insert(id, transfer.clone());
        log::trace!(
            "[journal] committed transfer {id}: {} -> {} amount={}",
            entry.source,
            entry.destination,
            entry.amount
        );
        Ok(transfer)
    }

    fn get(&self, id: TransferId) -> Option<Transfer> {
        self.entries.read().get(&id).cloned()
    }

    fn involving(&self, account: AccountId) -> Vec<Transfer> {
        self.entries
            .read()
            .values()
            .filter(|transfer| transfer.source == account || transfer.destination == account)
            .cloned()
            .collect()
    }
}
