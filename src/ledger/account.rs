use super::Decimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Serialize Decimal with exactly 2 decimal places
pub(super) fn serialize_decimal_2dp<S: Serializer>(
    value: &Decimal,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}"))
}

/// Identifier of an account. Assigned sequentially by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a user, the ownership anchor for accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// High-level account kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountKind::Checking => write!(f, "checking"),
            AccountKind::Savings => write!(f, "savings"),
        }
    }
}

/// A 3-letter currency code, uppercased on construction.
///
/// Currencies are only ever compared for equality; there is no conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub fn as_str(&self) -> &str {
        // Constructor only admits ASCII letters
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid currency code {0:?}: expected 3 ASCII letters")]
pub struct CurrencyError(pub String);

impl std::str::FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(CurrencyError(s.to_owned()));
        }
        Ok(Currency([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.as_str().to_owned()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot view of an account as stored by the `InMemoryStore`.
///
/// The balance is mutated exclusively by the `LedgerEngine` inside a held
/// atomic unit; everything else is immutable after creation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Account {
    #[serde(rename = "account")]
    id: AccountId,
    owner: UserId,
    kind: AccountKind,
    currency: Currency,
    #[serde(serialize_with = "serialize_decimal_2dp")]
    balance: Decimal,
    // Timestamps stay out of the CSV export
    #[serde(skip_serializing)]
    created_at: DateTime<Utc>,
}

impl Account {
    pub(super) fn new(
        id: AccountId,
        owner: UserId,
        kind: AccountKind,
        currency: Currency,
        balance: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            kind,
            currency,
            balance,
            created_at,
        }
    }

    /// Returns the account ID
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Returns the owning user's ID
    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Returns the account kind
    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    /// Returns the account currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns the balance at the time of the snapshot
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Returns the creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
