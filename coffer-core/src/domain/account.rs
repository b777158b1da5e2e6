//! Account domain model

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::interest::InterestPolicy;
use super::result::{Error, Result};

/// Account type that enables interest accrual (compared case-insensitively)
pub const SAVINGS_ACCOUNT_TYPE: &str = "savings";

/// Default annual rate for savings accounts, in percent (2.5)
pub const DEFAULT_SAVINGS_RATE: Decimal = Decimal::from_parts(25, 0, 0, false, 1);

/// Length of generated account numbers
const ACCOUNT_NUMBER_LEN: usize = 8;

/// Stable account identifier
///
/// Assigned from a monotonic counter when the account is created and never
/// reused. Accounts are never deleted, so the n-th account created has id n-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bank account held in the ledger
///
/// The balance is private: it only moves through [`Account::deposit`],
/// [`Account::withdraw`] and [`Account::apply_interest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Short opaque number shown to the user
    pub account_number: String,
    pub name: String,
    /// Free text; "savings" (any case) enables interest
    pub account_type: String,
    /// Currency tag, e.g. "SEK"
    pub valuta: String,
    balance: Decimal,
    /// Annual interest rate in percent
    pub interest_rate: Decimal,
    pub last_interest_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a zero-balance account
    ///
    /// Savings accounts start at [`DEFAULT_SAVINGS_RATE`], others at 0.
    pub fn new(
        id: AccountId,
        account_number: impl Into<String>,
        name: impl Into<String>,
        account_type: impl Into<String>,
        valuta: impl Into<String>,
        opened_at: DateTime<Utc>,
    ) -> Self {
        let account_type = account_type.into();
        let interest_rate = if Self::is_savings_type(&account_type) {
            DEFAULT_SAVINGS_RATE
        } else {
            Decimal::ZERO
        };
        Self {
            id,
            account_number: account_number.into(),
            name: name.into(),
            account_type,
            valuta: valuta.into(),
            balance: Decimal::ZERO,
            interest_rate,
            last_interest_at: opened_at,
            created_at: opened_at,
        }
    }

    /// Override the annual rate (only meaningful for savings accounts)
    pub fn with_interest_rate(mut self, rate: Decimal) -> Self {
        if self.is_savings() {
            self.interest_rate = rate;
        }
        self
    }

    /// Generate a fresh opaque account number
    pub fn generate_number() -> String {
        let mut number = Uuid::new_v4().simple().to_string();
        number.truncate(ACCOUNT_NUMBER_LEN);
        number
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn is_savings(&self) -> bool {
        Self::is_savings_type(&self.account_type)
    }

    fn is_savings_type(account_type: &str) -> bool {
        account_type.eq_ignore_ascii_case(SAVINGS_ACCOUNT_TYPE)
    }

    /// Add `amount` to the balance, returning the new balance
    pub fn deposit(&mut self, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| Error::overflow(format!("balance of account {} cannot hold {amount} more", self.id)))?;
        Ok(self.balance)
    }

    /// Remove `amount` from the balance, returning the new balance
    pub fn withdraw(&mut self, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }
        if amount > self.balance {
            return Err(Error::InsufficientFunds {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(self.balance)
    }

    /// Interest accrued since the last accrual, without applying it
    pub fn accrued_interest(&self, now: DateTime<Utc>, policy: &InterestPolicy) -> Result<Decimal> {
        policy.accrued_interest(self.balance, self.interest_rate, now - self.last_interest_at)
    }

    /// Credit accrued interest if it is strictly positive
    ///
    /// Returns the credited amount, or `None` when nothing accrued. The accrual
    /// timestamp only moves when interest is actually credited.
    pub fn apply_interest(
        &mut self,
        now: DateTime<Utc>,
        policy: &InterestPolicy,
    ) -> Result<Option<Decimal>> {
        if !self.is_savings() {
            return Err(Error::invalid_operation(format!(
                "interest can only be applied to savings accounts (account {} is '{}')",
                self.id, self.account_type
            )));
        }

        let interest = self.accrued_interest(now, policy)?;
        if interest <= Decimal::ZERO {
            return Ok(None);
        }

        self.balance = self
            .balance
            .checked_add(interest)
            .ok_or_else(|| Error::overflow(format!("interest on account {} exceeds the balance range", self.id)))?;
        self.last_interest_at = now;
        Ok(Some(interest))
    }

    /// Validate account data loaded from outside the ledger
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.balance < Decimal::ZERO {
            return Err("balance cannot be negative");
        }
        if self.account_number.trim().is_empty() {
            return Err("account number cannot be empty");
        }
        if self.interest_rate < Decimal::ZERO {
            return Err("interest rate cannot be negative");
        }
        Ok(())
    }
}
