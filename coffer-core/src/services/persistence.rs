//! Ledger persistence - ordered write queue in front of the key-value store
//!
//! Every ledger mutation submits a full snapshot (accounts + transactions)
//! while still holding the ledger lock, so snapshots reach the queue in
//! mutation order. A single background task drains the queue:
//!
//! - consecutive snapshots are coalesced, only the newest one is written
//! - each write is retried with exponential backoff
//! - failures are logged and counted, and reported to synchronous waiters
//!
//! In background mode nobody waits, so a crash right after a mutation can
//! lose it. Call [`PersistenceWriter::flush`] (via `Ledger::flush`) before
//! shutting down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::domain::{Account, Transaction};
use crate::ports::{save_json, KeyValueStore};

/// Store key holding the ordered account list
pub const ACCOUNTS_KEY: &str = "banking_accounts";

/// Store key holding the ordered transaction list
pub const TRANSACTIONS_KEY: &str = "banking_transactions";

/// Maximum number of retries for a failed snapshot write
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200ms)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 50;

/// Whether mutating calls wait for their write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    /// Return immediately; failures are only logged and counted
    #[default]
    Background,
    /// Wait for the write and return `Error::Persistence` if it fails
    Synchronous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Counters describing what the writer has done so far
#[derive(Debug, Default)]
struct Counters {
    writes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
}

/// Point-in-time copy of the writer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceStats {
    /// Snapshots written successfully
    pub writes: u64,
    /// Snapshots given up on after all retries
    pub failures: u64,
    /// Individual retry attempts
    pub retries: u64,
}

/// Full copy of the ledger collections
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

type Ack = oneshot::Sender<Result<(), String>>;

enum WriteRequest {
    Snapshot { snapshot: Snapshot, ack: Option<Ack> },
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer task
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<WriteRequest>,
    counters: Arc<Counters>,
}

impl PersistenceWriter {
    /// Start the writer task on the current tokio runtime
    pub fn spawn(store: Arc<dyn KeyValueStore>, retry: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        tokio::spawn(run_writer(store, retry, rx, Arc::clone(&counters)));
        Self { tx, counters }
    }

    /// Queue a snapshot
    ///
    /// With `wait` set, returns a receiver resolving to the write outcome.
    pub fn submit(
        &self,
        snapshot: Snapshot,
        wait: bool,
    ) -> Option<oneshot::Receiver<Result<(), String>>> {
        let (ack, rx) = if wait {
            let (ack, rx) = oneshot::channel();
            (Some(ack), Some(rx))
        } else {
            (None, None)
        };

        if self.tx.send(WriteRequest::Snapshot { snapshot, ack }).is_err() {
            tracing::warn!("ledger writer has stopped, snapshot dropped");
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        rx
    }

    /// Wait until everything queued so far has been written (or given up on)
    pub async fn flush(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(WriteRequest::Flush(done)).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn stats(&self) -> PersistenceStats {
        PersistenceStats {
            writes: self.counters.writes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
        }
    }
}

async fn run_writer(
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<WriteRequest>,
    counters: Arc<Counters>,
) {
    while let Some(request) = rx.recv().await {
        let (mut latest, mut acks) = match request {
            WriteRequest::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            WriteRequest::Snapshot { snapshot, ack } => (snapshot, ack.into_iter().collect::<Vec<_>>()),
        };

        // Coalesce whatever else is already queued, stopping at a flush
        let mut flush = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WriteRequest::Snapshot { snapshot, ack } => {
                    latest = snapshot;
                    acks.extend(ack);
                }
                WriteRequest::Flush(done) => {
                    flush = Some(done);
                    break;
                }
            }
        }

        let outcome = write_with_retry(store.as_ref(), &latest, &retry, &counters).await;
        for ack in acks {
            let _ = ack.send(outcome.clone());
        }
        if let Some(done) = flush {
            let _ = done.send(());
        }
    }
    tracing::debug!("ledger writer stopped");
}

async fn write_with_retry(
    store: &dyn KeyValueStore,
    snapshot: &Snapshot,
    retry: &RetryPolicy,
    counters: &Counters,
) -> Result<(), String> {
    let mut attempt = 0;
    loop {
        let result = match save_json(store, ACCOUNTS_KEY, &snapshot.accounts).await {
            Ok(()) => save_json(store, TRANSACTIONS_KEY, &snapshot.transactions).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                counters.writes.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(e) if attempt < retry.max_retries => {
                let delay = retry.delay_for(attempt);
                tracing::debug!(
                    error = %e,
                    attempt = attempt + 1,
                    max_retries = retry.max_retries,
                    "snapshot write failed, retrying in {}ms",
                    delay.as_millis()
                );
                counters.retries.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "ledger snapshot could not be persisted");
                return Err(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delays_double() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_for(0), Duration::from_millis(50));
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
    }
}
