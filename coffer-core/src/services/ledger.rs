//! Ledger service - accounts, transactions and every operation over them
//!
//! The ledger owns the authoritative in-memory collections. Mutations run
//! under one lock per ledger, append the matching transaction records, and
//! queue a snapshot for persistence before the lock is released. Queries
//! return copies and never touch storage.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountId, InterestPolicy, Transaction, TransactionKind, DEFAULT_SAVINGS_RATE,
};
use crate::ports::{load_json, Clock, KeyValueStore};

use super::persistence::{
    PersistenceMode, PersistenceStats, PersistenceWriter, RetryPolicy, Snapshot, ACCOUNTS_KEY,
    TRANSACTIONS_KEY,
};

/// Tunables for a ledger instance
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub interest: InterestPolicy,
    /// Annual rate (percent) given to new savings accounts
    pub default_savings_rate: Decimal,
    pub persistence: PersistenceMode,
    pub retry: RetryPolicy,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            interest: InterestPolicy::default(),
            default_savings_rate: DEFAULT_SAVINGS_RATE,
            persistence: PersistenceMode::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Portable copy of the whole ledger, as produced by `export_data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerDocument {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

/// Aggregate view used by `coffer status`
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSummary {
    pub total_accounts: usize,
    pub savings_accounts: usize,
    pub total_transactions: usize,
    /// Sum of balances per currency
    pub totals: BTreeMap<String, Decimal>,
}

/// Which field `sort_history` orders by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Amount,
    Date,
}

impl SortKey {
    /// Parse a sort key case-insensitively; unknown keys yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "amount" => Some(SortKey::Amount),
            "date" => Some(SortKey::Date),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    next_account_id: u32,
    next_transaction_id: u64,
    /// Bumped on every change; tells the ledger whether to persist
    revision: u64,
}

impl LedgerState {
    /// Rebuild state from a validated document, resuming both id counters
    fn from_parts(accounts: Vec<Account>, transactions: Vec<Transaction>) -> Result<Self> {
        let next_account_id = match accounts.iter().map(|a| a.id.0).max() {
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| Error::overflow(format!("account id {max} leaves no room for new accounts")))?,
            None => 0,
        };
        let next_transaction_id = match transactions.iter().map(|t| t.id).max() {
            Some(max) => max.checked_add(1).ok_or_else(|| {
                Error::overflow(format!("transaction id {max} leaves no room for new records"))
            })?,
            None => 0,
        };
        Ok(Self {
            accounts,
            transactions,
            next_account_id,
            next_transaction_id,
            revision: 0,
        })
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            accounts: self.accounts.clone(),
            transactions: self.transactions.clone(),
        }
    }

    fn account(&self, id: AccountId) -> Result<&Account> {
        self.accounts
            .iter()
            .find(|a| a.id == id)
            .ok_or(Error::AccountNotFound(id))
    }

    fn account_mut(&mut self, id: AccountId) -> Result<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(Error::AccountNotFound(id))
    }

    fn history(&self, id: AccountId) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(move |t| t.account_id == id)
    }

    fn create_account(
        &mut self,
        name: &str,
        account_type: &str,
        valuta: &str,
        default_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let id = AccountId(self.next_account_id);
        let next = id
            .0
            .checked_add(1)
            .ok_or_else(|| Error::overflow("no account ids left"))?;
        let account = Account::new(id, Account::generate_number(), name, account_type, valuta, now)
            .with_interest_rate(default_rate);
        self.next_account_id = next;
        self.accounts.push(account.clone());
        self.revision += 1;
        Ok(account)
    }

    /// Append a transaction carrying the account's current balance
    fn record(
        &mut self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        let balance = self.account(account_id)?.balance();
        let next = self
            .next_transaction_id
            .checked_add(1)
            .ok_or_else(|| Error::overflow("no transaction ids left"))?;
        let tx = Transaction::new(
            self.next_transaction_id,
            account_id,
            kind,
            amount,
            balance,
            description,
            now,
        );
        self.next_transaction_id = next;
        self.transactions.push(tx.clone());
        self.revision += 1;
        Ok(tx)
    }

    fn deposit(&mut self, id: AccountId, amount: Decimal, now: DateTime<Utc>) -> Result<Transaction> {
        self.account_mut(id)?.deposit(amount)?;
        self.record(id, TransactionKind::Deposit, amount, "Deposit made.".to_string(), now)
    }

    fn withdraw(&mut self, id: AccountId, amount: Decimal, now: DateTime<Utc>) -> Result<Transaction> {
        self.account_mut(id)?.withdraw(amount)?;
        self.record(id, TransactionKind::Withdraw, amount, "Withdrawal made.".to_string(), now)
    }

    /// Withdraw leg, deposit leg, then the two transfer annotations
    ///
    /// The legs are not rolled back: if the deposit leg fails the source
    /// account stays debited.
    fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        if from == to {
            return Err(Error::InvalidTransfer);
        }

        let out_leg = self.withdraw(from, amount, now)?;
        let in_leg = self.deposit(to, amount, now)?;
        let out_note = self.record(
            from,
            TransactionKind::TransferOut,
            amount,
            format!("Transferred to account {to}"),
            now,
        )?;
        let in_note = self.record(
            to,
            TransactionKind::TransferIn,
            amount,
            format!("Received from account {from}"),
            now,
        )?;

        Ok(vec![out_leg, in_leg, out_note, in_note])
    }

    fn apply_interest(
        &mut self,
        id: AccountId,
        policy: &InterestPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<Transaction>> {
        let account = self.account_mut(id)?;
        let Some(interest) = account.apply_interest(now, policy)? else {
            return Ok(None);
        };
        let rate = account.interest_rate;
        let tx = self.record(
            id,
            TransactionKind::Interest,
            interest,
            format!("Interest applied at {rate}% annual rate"),
            now,
        )?;
        Ok(Some(tx))
    }
}

/// The ledger service
pub struct Ledger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
    settings: LedgerSettings,
    writer: PersistenceWriter,
}

impl Ledger {
    /// Load persisted accounts and transactions, then start accepting calls
    ///
    /// Loading finishes before the ledger is handed out, so no mutation can
    /// race the initial read.
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        settings: LedgerSettings,
    ) -> Result<Self> {
        let accounts: Vec<Account> = load_json(store.as_ref(), ACCOUNTS_KEY)
            .await?
            .unwrap_or_default();
        let transactions: Vec<Transaction> = load_json(store.as_ref(), TRANSACTIONS_KEY)
            .await?
            .unwrap_or_default();

        let document = LedgerDocument {
            accounts,
            transactions,
        };
        validate_document(&document).map_err(|e| match e {
            Error::Import(reason) => Error::storage(format!("stored ledger is invalid: {reason}")),
            other => other,
        })?;
        let state = LedgerState::from_parts(document.accounts, document.transactions)?;

        tracing::debug!(
            accounts = state.accounts.len(),
            transactions = state.transactions.len(),
            "ledger loaded"
        );

        let writer = PersistenceWriter::spawn(store, settings.retry);
        Ok(Self {
            state: Mutex::new(state),
            clock,
            settings,
            writer,
        })
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `op` under the ledger lock and persist if it changed anything
    ///
    /// State changes made before `op` fails (a transfer whose deposit leg
    /// fails) are persisted too.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut LedgerState, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let now = self.clock.now();
        let wait = self.settings.persistence == PersistenceMode::Synchronous;

        let (result, ack) = {
            let mut state = self.state();
            let before = state.revision;
            let result = op(&mut *state, now);
            let ack = if state.revision != before {
                self.writer.submit(state.snapshot(), wait)
            } else {
                None
            };
            (result, ack)
        };

        let persisted = match ack {
            Some(rx) => Self::await_write(rx).await,
            None => Ok(()),
        };
        let value = result?;
        persisted?;
        Ok(value)
    }

    async fn await_write(rx: oneshot::Receiver<std::result::Result<(), String>>) -> Result<()> {
        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::persistence(e)),
            Err(_) => Err(Error::persistence("ledger writer stopped")),
        }
    }

    /// Wait for every queued snapshot to be written
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    pub fn persistence_stats(&self) -> PersistenceStats {
        self.writer.stats()
    }

    // === Mutations ===

    /// Open a zero-balance account
    pub async fn create_account(&self, name: &str, account_type: &str, valuta: &str) -> Result<Account> {
        let default_rate = self.settings.default_savings_rate;
        let account = self
            .mutate(|state, now| state.create_account(name, account_type, valuta, default_rate, now))
            .await?;
        tracing::debug!(account = %account.id, "account created");
        Ok(account)
    }

    pub async fn deposit(&self, account_id: AccountId, amount: Decimal) -> Result<Transaction> {
        self.mutate(|state, now| state.deposit(account_id, amount, now)).await
    }

    pub async fn withdraw(&self, account_id: AccountId, amount: Decimal) -> Result<Transaction> {
        self.mutate(|state, now| state.withdraw(account_id, amount, now)).await
    }

    /// Move money between two accounts
    ///
    /// Returns the four records written: withdraw leg, deposit leg,
    /// "Transfer Out" and "Transfer In".
    pub async fn transfer_funds(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<Vec<Transaction>> {
        let result = self.mutate(|state, now| state.transfer(from, to, amount, now)).await;
        if let Err(Error::AccountNotFound(missing)) = &result {
            if *missing == to {
                tracing::warn!(%from, %to, "transfer deposit leg failed after withdrawal");
            }
        }
        result
    }

    /// Append a free-form record without touching any balance
    pub async fn create_transaction(
        &self,
        account_id: AccountId,
        amount: Decimal,
        kind: &str,
        description: &str,
    ) -> Result<Transaction> {
        self.mutate(|state, now| {
            state.record(
                account_id,
                TransactionKind::from(kind),
                amount,
                description.to_string(),
                now,
            )
        })
        .await
    }

    /// Credit accrued interest to one savings account
    ///
    /// Returns `None` when nothing has accrued yet.
    pub async fn apply_interest(&self, account_id: AccountId) -> Result<Option<Transaction>> {
        let policy = self.settings.interest;
        self.mutate(|state, now| state.apply_interest(account_id, &policy, now)).await
    }

    /// Credit accrued interest to every savings account
    ///
    /// Returns the interest records written. An account whose balance
    /// cannot hold its interest is skipped with a warning and keeps its
    /// accrual timestamp; the others are still credited.
    pub async fn apply_interest_to_all_savings_accounts(&self) -> Result<Vec<Transaction>> {
        let policy = self.settings.interest;
        self.mutate(|state, now| {
            let ids: Vec<AccountId> = state
                .accounts
                .iter()
                .filter(|a| a.is_savings())
                .map(|a| a.id)
                .collect();

            let mut credited = Vec::new();
            for id in ids {
                match state.apply_interest(id, &policy, now) {
                    Ok(Some(tx)) => credited.push(tx),
                    Ok(None) => {}
                    Err(Error::Overflow(reason)) => {
                        tracing::warn!(account = %id, %reason, "interest skipped");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(credited)
        })
        .await
    }

    /// Replace the whole ledger with an exported document
    ///
    /// The document is parsed and validated completely before anything is
    /// replaced; on error the ledger is untouched.
    pub async fn import_data(&self, json: &str) -> Result<()> {
        let document: LedgerDocument =
            serde_json::from_str(json).map_err(|e| Error::import(format!("malformed document: {e}")))?;
        validate_document(&document)?;

        self.mutate(|state, _| {
            let revision = state.revision;
            *state = LedgerState::from_parts(document.accounts, document.transactions)?;
            state.revision = revision + 1;
            Ok(())
        })
        .await
    }

    // === Queries ===

    /// Copy of all accounts in creation order
    pub fn get_accounts(&self) -> Vec<Account> {
        self.state().accounts.clone()
    }

    pub fn get_account(&self, account_id: AccountId) -> Result<Account> {
        self.state().account(account_id).cloned()
    }

    pub fn find_by_number(&self, account_number: &str) -> Option<Account> {
        self.state()
            .accounts
            .iter()
            .find(|a| a.account_number == account_number)
            .cloned()
    }

    /// All records of one account in insertion order
    pub fn get_transaction_history(&self, account_id: AccountId) -> Vec<Transaction> {
        self.state().history(account_id).cloned().collect()
    }

    /// History narrowed by optional inclusive date bounds and exact type
    ///
    /// An empty `kind` filter passes everything, like an omitted one.
    pub fn filter_history(
        &self,
        account_id: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        kind: Option<&str>,
    ) -> Vec<Transaction> {
        let kind = kind.filter(|k| !k.is_empty());
        self.state()
            .history(account_id)
            .filter(|t| from.map_or(true, |from| t.date >= from))
            .filter(|t| to.map_or(true, |to| t.date <= to))
            .filter(|t| kind.map_or(true, |kind| t.kind.as_str() == kind))
            .cloned()
            .collect()
    }

    /// History ordered by "amount" or "date" (case-insensitive)
    ///
    /// Unknown keys return insertion order. The sort is stable.
    pub fn sort_history(&self, account_id: AccountId, sort_by: &str, ascending: bool) -> Vec<Transaction> {
        let mut history = self.get_transaction_history(account_id);
        match SortKey::parse(sort_by) {
            Some(SortKey::Amount) if ascending => history.sort_by(|a, b| a.amount.cmp(&b.amount)),
            Some(SortKey::Amount) => history.sort_by(|a, b| b.amount.cmp(&a.amount)),
            Some(SortKey::Date) if ascending => history.sort_by(|a, b| a.date.cmp(&b.date)),
            Some(SortKey::Date) => history.sort_by(|a, b| b.date.cmp(&a.date)),
            None => {}
        }
        history
    }

    /// Interest that `apply_interest` would credit right now
    pub fn preview_interest(&self, account_id: AccountId) -> Result<Decimal> {
        let now = self.clock.now();
        let state = self.state();
        let account = state.account(account_id)?;
        if !account.is_savings() {
            return Ok(Decimal::ZERO);
        }
        account.accrued_interest(now, &self.settings.interest)
    }

    /// Counts and per-currency totals; a total saturates at `Decimal::MAX`
    pub fn summary(&self) -> LedgerSummary {
        let state = self.state();
        let mut totals = BTreeMap::new();
        for account in &state.accounts {
            let total = totals.entry(account.valuta.clone()).or_insert(Decimal::ZERO);
            *total = total.saturating_add(account.balance());
        }
        LedgerSummary {
            total_accounts: state.accounts.len(),
            savings_accounts: state.accounts.iter().filter(|a| a.is_savings()).count(),
            total_transactions: state.transactions.len(),
            totals,
        }
    }

    /// Serialize accounts and transactions into one JSON document
    pub fn export_data(&self) -> Result<String> {
        let document = {
            let state = self.state();
            LedgerDocument {
                accounts: state.accounts.clone(),
                transactions: state.transactions.clone(),
            }
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Write one account's history as CSV, returning the number of rows
    pub fn export_history_csv<W: Write>(&self, account_id: AccountId, out: W) -> Result<usize> {
        #[derive(Serialize)]
        struct Row<'a> {
            id: u64,
            date: String,
            #[serde(rename = "type")]
            kind: &'a str,
            amount: Decimal,
            balance_after: Decimal,
            description: &'a str,
        }

        self.get_account(account_id)?;
        let history = self.get_transaction_history(account_id);

        let mut writer = csv::Writer::from_writer(out);
        for tx in &history {
            writer.serialize(Row {
                id: tx.id,
                date: tx.date.to_rfc3339(),
                kind: tx.kind.as_str(),
                amount: tx.amount,
                balance_after: tx.balance_after,
                description: &tx.description,
            })?;
        }
        writer.flush()?;
        Ok(history.len())
    }
}

/// Check an imported document before it replaces the ledger
fn validate_document(document: &LedgerDocument) -> Result<()> {
    let mut ids = HashSet::new();
    let mut numbers = HashSet::new();
    for account in &document.accounts {
        account
            .validate()
            .map_err(|e| Error::import(format!("account {}: {e}", account.id)))?;
        if !ids.insert(account.id) {
            return Err(Error::import(format!("duplicate account id {}", account.id)));
        }
        if !numbers.insert(account.account_number.as_str()) {
            return Err(Error::import(format!(
                "duplicate account number {}",
                account.account_number
            )));
        }
    }

    if ids.contains(&AccountId(u32::MAX)) {
        return Err(Error::import(format!("account id {} is out of range", u32::MAX)));
    }

    let mut tx_ids = HashSet::new();
    for tx in &document.transactions {
        if tx.id == u64::MAX {
            return Err(Error::import(format!("transaction id {} is out of range", tx.id)));
        }
        if !ids.contains(&tx.account_id) {
            return Err(Error::import(format!(
                "transaction {} references unknown account {}",
                tx.id, tx.account_id
            )));
        }
        if !tx_ids.insert(tx.id) {
            return Err(Error::import(format!("duplicate transaction id {}", tx.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn state_with(n: usize) -> LedgerState {
        let mut state = LedgerState::default();
        for i in 0..n {
            state
                .create_account(&format!("Account {i}"), "checking", "SEK", DEFAULT_SAVINGS_RATE, now())
                .unwrap();
        }
        state
    }

    #[test]
    fn test_ids_are_sequential() {
        let state = state_with(3);
        let ids: Vec<u32> = state.accounts.iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(state.next_account_id, 3);
    }

    #[test]
    fn test_from_parts_resumes_counters() {
        let mut state = state_with(2);
        state.deposit(AccountId(1), Decimal::new(10, 0), now()).unwrap();
        let resumed = LedgerState::from_parts(state.accounts.clone(), state.transactions.clone()).unwrap();
        assert_eq!(resumed.next_account_id, 2);
        assert_eq!(resumed.next_transaction_id, 1);
    }

    #[test]
    fn test_failed_validation_does_not_bump_revision() {
        let mut state = state_with(1);
        let before = state.revision;
        assert!(state.deposit(AccountId(0), Decimal::ZERO, now()).is_err());
        assert!(state.withdraw(AccountId(9), Decimal::ONE, now()).is_err());
        assert_eq!(state.revision, before);
    }

    #[test]
    fn test_transfer_to_missing_account_keeps_withdrawal() {
        let mut state = state_with(1);
        state.deposit(AccountId(0), Decimal::new(100, 0), now()).unwrap();

        let err = state
            .transfer(AccountId(0), AccountId(5), Decimal::new(30, 0), now())
            .unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(AccountId(5))));
        assert_eq!(state.account(AccountId(0)).unwrap().balance(), Decimal::new(70, 0));
        assert_eq!(state.transactions.len(), 2);
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("AMOUNT"), Some(SortKey::Amount));
        assert_eq!(SortKey::parse("Date"), Some(SortKey::Date));
        assert_eq!(SortKey::parse("description"), None);
    }

    #[test]
    fn test_validate_document_rejects_orphans() {
        let mut state = state_with(1);
        state.deposit(AccountId(0), Decimal::ONE, now()).unwrap();
        let mut document = LedgerDocument {
            accounts: state.accounts.clone(),
            transactions: state.transactions.clone(),
        };
        assert!(validate_document(&document).is_ok());

        document.transactions[0].account_id = AccountId(42);
        assert!(matches!(validate_document(&document), Err(Error::Import(_))));
    }

    #[test]
    fn test_max_ids_are_rejected_not_wrapped() {
        let mut state = state_with(1);
        state.deposit(AccountId(0), Decimal::ONE, now()).unwrap();

        let mut accounts = state.accounts.clone();
        accounts[0].id = AccountId(u32::MAX);
        assert!(LedgerState::from_parts(accounts.clone(), Vec::new()).is_err());
        let document = LedgerDocument {
            accounts,
            transactions: Vec::new(),
        };
        assert!(matches!(validate_document(&document), Err(Error::Import(_))));

        let mut transactions = state.transactions.clone();
        transactions[0].id = u64::MAX;
        assert!(LedgerState::from_parts(state.accounts.clone(), transactions.clone()).is_err());
        let document = LedgerDocument {
            accounts: state.accounts.clone(),
            transactions,
        };
        assert!(matches!(validate_document(&document), Err(Error::Import(_))));
    }

    #[test]
    fn test_exhausted_account_ids_fail_cleanly() {
        let mut state = state_with(0);
        state.next_account_id = u32::MAX;
        let err = state
            .create_account("Last", "checking", "SEK", DEFAULT_SAVINGS_RATE, now())
            .unwrap_err();
        assert!(matches!(err, Error::Overflow(_)));
        assert!(state.accounts.is_empty());
        assert_eq!(state.revision, 0);
    }

    #[test]
    fn test_validate_document_rejects_duplicate_ids() {
        let state = state_with(2);
        let mut accounts = state.accounts.clone();
        accounts[1].id = AccountId(0);
        let document = LedgerDocument {
            accounts,
            transactions: Vec::new(),
        };
        assert!(matches!(validate_document(&document), Err(Error::Import(_))));
    }
}
