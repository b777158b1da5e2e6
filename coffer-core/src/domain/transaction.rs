//! Transaction domain model

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::AccountId;

/// What a transaction records
///
/// Serialized as its display string ("Deposit", "Transfer Out", ...), so
/// caller-supplied types round-trip as plain text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    TransferOut,
    TransferIn,
    Interest,
    /// Free-text type recorded through `create_transaction`
    Other(String),
}

impl TransactionKind {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionKind::Deposit => "Deposit",
            TransactionKind::Withdraw => "Withdraw",
            TransactionKind::TransferOut => "Transfer Out",
            TransactionKind::TransferIn => "Transfer In",
            TransactionKind::Interest => "Interest",
            TransactionKind::Other(s) => s,
        }
    }
}

impl From<String> for TransactionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Deposit" => TransactionKind::Deposit,
            "Withdraw" => TransactionKind::Withdraw,
            "Transfer Out" => TransactionKind::TransferOut,
            "Transfer In" => TransactionKind::TransferIn,
            "Interest" => TransactionKind::Interest,
            _ => TransactionKind::Other(value),
        }
    }
}

impl From<&str> for TransactionKind {
    fn from(value: &str) -> Self {
        TransactionKind::from(value.to_string())
    }
}

impl From<TransactionKind> for String {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sequence number, unique within the ledger
    pub id: u64,
    pub account_id: AccountId,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    /// Account balance right after this record was written
    pub balance_after: Decimal,
    pub description: String,
}

impl Transaction {
    pub fn new(
        id: u64,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
        balance_after: Decimal,
        description: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            date,
            kind,
            amount,
            balance_after,
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(TransactionKind::TransferOut.as_str(), "Transfer Out");
        assert_eq!(TransactionKind::from("Transfer In"), TransactionKind::TransferIn);
        assert_eq!(
            TransactionKind::from("Fee"),
            TransactionKind::Other("Fee".to_string())
        );
    }

    #[test]
    fn test_serialized_shape() {
        let tx = Transaction::new(
            3,
            AccountId(1),
            TransactionKind::TransferIn,
            Decimal::new(3000, 2),
            Decimal::new(3000, 2),
            "Received from account 0",
            Utc::now(),
        );
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["type"], "Transfer In");
        assert_eq!(value["account_id"], 1);
        assert_eq!(value["amount"], "30.00");

        let back: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(back, tx);
    }
}
