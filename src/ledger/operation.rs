use serde::Deserialize;

use super::account::{AccountId, AccountKind, Currency, UserId};
use super::error::OpError;
use super::Decimal;

/// Raw operation row as parsed from CSV input.
/// This is the unvalidated form that needs conversion to an `Operation`.
#[derive(Debug, Deserialize, Clone)]
pub struct OpRecord {
    pub op: OpType,
    /// Requesting user (the account owner for `open`, the requestor for
    /// `transfer`)
    pub user: u64,
    /// Source account id; empty for `open`
    pub account: Option<u64>,
    /// Destination account id; empty for `open`
    pub to: Option<u64>,
    /// Account kind; only for `open`
    pub kind: Option<AccountKind>,
    /// Currency code; only for `open`
    pub currency: Option<String>,
    /// Initial balance for `open` (defaults to zero), transfer amount for
    /// `transfer` (required)
    pub amount: Option<Decimal>,
}

impl std::fmt::Display for OpRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (user: {}", self.op, self.user)?;
        if let Some(account) = self.account {
            write!(f, ", account: {account}")?;
        }
        if let Some(to) = self.to {
            write!(f, ", to: {to}")?;
        }
        if let Some(kind) = self.kind {
            write!(f, ", kind: {kind}")?;
        }
        if let Some(currency) = &self.currency {
            write!(f, ", currency: {currency}")?;
        }
        if let Some(amount) = self.amount {
            write!(f, ", amount: {amount}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Open,
    Transfer,
}

impl std::fmt::Display for OpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpType::Open => write!(f, "open"),
            OpType::Transfer => write!(f, "transfer"),
        }
    }
}

/// A validated operation ready for dispatch.
#[derive(Debug, Clone)]
pub enum Operation {
    Open(OpenAccount),
    Transfer(TransferRequest),
}

/// A validated account-opening request.
#[derive(Debug, Clone)]
pub struct OpenAccount {
    owner: UserId,
    kind: AccountKind,
    currency: Currency,
    initial_balance: Decimal,
}

impl OpenAccount {
    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }
}

impl TryFrom<OpRecord> for OpenAccount {
    type Error = OpError;

    fn try_from(record: OpRecord) -> Result<Self, Self::Error> {
        match record.clone() {
            OpRecord {
                op: OpType::Open,
                user,
                account: None,
                to: None,
                kind: Some(kind),
                currency: Some(currency),
                amount,
            } => {
                let initial_balance = amount.unwrap_or(Decimal::ZERO);
                let Ok(currency) = currency.parse::<Currency>() else {
                    return Err(OpError::InvalidOperation(record));
                };
                if initial_balance < Decimal::ZERO || initial_balance.scale() > 2 {
                    return Err(OpError::InvalidOperation(record));
                }
                Ok(OpenAccount {
                    owner: UserId(user),
                    kind,
                    currency,
                    initial_balance,
                })
            }
            _ => Err(OpError::InvalidOperation(record)),
        }
    }
}

/// A validated transfer request, before the ledger engine has seen it.
///
/// The amount guard here is the dispatcher-side pre-validation; the engine
/// re-validates because it owns the invariant.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    requestor: UserId,
    source: AccountId,
    destination: AccountId,
    amount: Decimal,
}

impl TransferRequest {
    pub fn requestor(&self) -> UserId {
        self.requestor
    }

    pub fn source(&self) -> AccountId {
        self.source
    }

    pub fn destination(&self) -> AccountId {
        self.destination
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

impl TryFrom<OpRecord> for TransferRequest {
    type Error = OpError;

    fn try_from(record: OpRecord) -> Result<Self, Self::Error> {
        match record {
            OpRecord {
                op: OpType::Transfer,
                user,
                account: Some(source),
                to: Some(destination),
                kind: None,
                currency: None,
                amount: Some(amount),
            } if amount > Decimal::ZERO && amount.scale() <= 2 => Ok(TransferRequest {
                requestor: UserId(user),
                source: AccountId(source),
                destination: AccountId(destination),
                amount,
            }),
            _ => Err(OpError::InvalidOperation(record)),
        }
    }
}

impl TryFrom<OpRecord> for Operation {
    type Error = OpError;

    fn try_from(record: OpRecord) -> Result<Self, Self::Error> {
        match record.op {
            OpType::Open => Ok(Operation::Open(OpenAccount::try_from(record)?)),
            OpType::Transfer => Ok(Operation::Transfer(TransferRequest::try_from(record)?)),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Open(open) => write!(
                f,
                "[open] user={} kind={} currency={} initial={}",
                open.owner(),
                open.kind(),
                open.currency(),
                open.initial_balance()
            ),
            Operation::Transfer(transfer) => write!(
                f,
                "[transfer] user={} source={} to={} amount={}",
                transfer.requestor(),
                transfer.source(),
                transfer.destination(),
                transfer.amount()
            ),
        }
    }
}
