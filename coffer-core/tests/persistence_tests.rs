//! Persistence tests - write queue, retries, failure reporting and stores
//!
//! Run with: cargo test --test persistence_tests -- --nocapture

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tempfile::TempDir;

use coffer_core::adapters::{DuckDbStore, JsonFileStore, MemoryStore};
use coffer_core::config::{Config, StorageBackend};
use coffer_core::domain::PinHashScheme;
use coffer_core::ports::{KeyValueStore, SystemClock};
use coffer_core::services::{Ledger, LedgerSettings, PersistenceMode, PinGuard, RetryPolicy};
use coffer_core::{open_store, CofferContext, Error};

/// Store whose writes fail a given number of times before succeeding
struct FlakyStore {
    inner: MemoryStore,
    failures_left: AtomicU32,
    save_calls: AtomicU32,
}

impl FlakyStore {
    fn failing(times: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures_left: AtomicU32::new(times),
            save_calls: AtomicU32::new(0),
        }
    }

    fn broken() -> Self {
        Self::failing(u32::MAX)
    }

    fn take_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn save(&self, key: &str, value: JsonValue) -> coffer_core::Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(Error::storage("disk unavailable"));
        }
        self.inner.save(key, value).await
    }

    async fn get(&self, key: &str) -> coffer_core::Result<Option<JsonValue>> {
        self.inner.get(key).await
    }

    async fn remove(&self, key: &str) -> coffer_core::Result<()> {
        if self.take_failure() {
            return Err(Error::storage("disk unavailable"));
        }
        self.inner.remove(key).await
    }
}

fn settings(mode: PersistenceMode) -> LedgerSettings {
    LedgerSettings {
        persistence: mode,
        retry: RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
        },
        ..LedgerSettings::default()
    }
}

async fn ledger_over(store: Arc<FlakyStore>, mode: PersistenceMode) -> Ledger {
    Ledger::load(store, Arc::new(SystemClock), settings(mode))
        .await
        .unwrap()
}

// ============================================================================
// Write queue
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let store = Arc::new(FlakyStore::failing(2));
    let ledger = ledger_over(store.clone(), PersistenceMode::Background).await;

    let account = ledger.create_account("A", "checking", "SEK").await.unwrap();
    ledger.flush().await;

    let stats = ledger.persistence_stats();
    assert_eq!(stats.writes, 1);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.failures, 0);

    let reloaded = Ledger::load(store, Arc::new(SystemClock), LedgerSettings::default())
        .await
        .unwrap();
    assert_eq!(reloaded.get_account(account.id).unwrap().name, "A");
}

#[tokio::test(start_paused = true)]
async fn test_background_failures_are_counted_not_returned() {
    let store = Arc::new(FlakyStore::broken());
    let ledger = ledger_over(store.clone(), PersistenceMode::Background).await;

    let account = ledger.create_account("A", "checking", "SEK").await.unwrap();
    ledger.deposit(account.id, Decimal::from(10)).await.unwrap();
    ledger.flush().await;

    // Memory keeps the change even though nothing reached the store
    assert_eq!(ledger.get_account(account.id).unwrap().balance(), Decimal::from(10));
    let stats = ledger.persistence_stats();
    assert!(stats.failures >= 1);
    assert_eq!(stats.writes, 0);
    assert!(store.inner.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_synchronous_mode_surfaces_failures() {
    let store = Arc::new(FlakyStore::broken());
    let ledger = ledger_over(store.clone(), PersistenceMode::Synchronous).await;

    let err = ledger.create_account("A", "checking", "SEK").await.unwrap_err();
    assert!(matches!(err, Error::Persistence(_)));

    // The mutation itself stays applied
    assert_eq!(ledger.get_accounts().len(), 1);
    // One initial attempt plus three retries, each failing on the first key
    assert_eq!(store.save_calls.load(Ordering::SeqCst), 4);
    assert_eq!(ledger.persistence_stats().retries, 3);
}

#[tokio::test(start_paused = true)]
async fn test_synchronous_mode_succeeds_after_retry() {
    let store = Arc::new(FlakyStore::failing(1));
    let ledger = ledger_over(store.clone(), PersistenceMode::Synchronous).await;

    let account = ledger.create_account("A", "checking", "SEK").await.unwrap();
    assert!(store.inner.get("banking_accounts").await.unwrap().is_some());
    assert_eq!(ledger.get_account(account.id).unwrap().name, "A");
}

#[tokio::test]
async fn test_failed_validation_writes_nothing() {
    let store = Arc::new(FlakyStore::failing(0));
    let ledger = ledger_over(store.clone(), PersistenceMode::Synchronous).await;
    let account = ledger.create_account("A", "checking", "SEK").await.unwrap();
    let calls = store.save_calls.load(Ordering::SeqCst);

    assert!(ledger.withdraw(account.id, Decimal::ONE).await.is_err());
    assert!(ledger.deposit(account.id, Decimal::ZERO).await.is_err());
    ledger.flush().await;

    assert_eq!(store.save_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_queries_do_not_touch_storage() {
    let store = Arc::new(FlakyStore::failing(0));
    let ledger = ledger_over(store.clone(), PersistenceMode::Background).await;
    let account = ledger.create_account("A", "checking", "SEK").await.unwrap();
    ledger.flush().await;
    let calls = store.save_calls.load(Ordering::SeqCst);

    ledger.get_accounts();
    ledger.get_transaction_history(account.id);
    ledger.sort_history(account.id, "amount", true);
    ledger.summary();
    ledger.export_data().unwrap();
    ledger.flush().await;

    assert_eq!(store.save_calls.load(Ordering::SeqCst), calls);
}

// ============================================================================
// PIN guard over a failing store
// ============================================================================

#[tokio::test]
async fn test_pin_store_failures_are_swallowed() {
    let store = Arc::new(FlakyStore::broken());
    let pins = PinGuard::new(store, PinHashScheme::Legacy);

    // The write fails quietly and the previous (absent) credential remains
    pins.set_pin("1234").await.unwrap();
    assert!(!pins.has_pin().await);
    assert!(!pins.validate_pin("1234").await);
    pins.clear_pin().await;

    // Format errors are still reported
    assert!(matches!(
        pins.set_pin("12").await,
        Err(Error::InvalidPinFormat)
    ));
}

// ============================================================================
// Stores behind the context
// ============================================================================

#[tokio::test]
async fn test_json_backend_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Json;
    config.save(temp_dir.path()).unwrap();

    {
        let ctx = CofferContext::open(temp_dir.path()).await.unwrap();
        let account = ctx.ledger.create_account("A", "savings", "SEK").await.unwrap();
        ctx.ledger.deposit(account.id, Decimal::from(42)).await.unwrap();
        ctx.pins.set_pin("2468").await.unwrap();
        ctx.ledger.flush().await;
    }
    // Let the stopped writer task release its store handle
    tokio::task::yield_now().await;

    assert!(temp_dir.path().join("store/banking_accounts.json").exists());
    assert!(temp_dir.path().join("store/banking_pin_hash.json").exists());

    let ctx = CofferContext::open(temp_dir.path()).await.unwrap();
    assert_eq!(ctx.ledger.get_accounts()[0].balance(), Decimal::from(42));
    assert!(ctx.pins.validate_pin("2468").await);
}

#[tokio::test]
async fn test_duckdb_backend_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    {
        let ctx = CofferContext::open(temp_dir.path()).await.unwrap();
        assert_eq!(ctx.config.storage.backend, StorageBackend::Duckdb);
        let account = ctx.ledger.create_account("A", "checking", "EUR").await.unwrap();
        ctx.ledger.deposit(account.id, Decimal::from(7)).await.unwrap();
        ctx.ledger.flush().await;
    }
    tokio::task::yield_now().await;
    assert!(temp_dir.path().join("coffer.duckdb").exists());

    let ctx = CofferContext::open(temp_dir.path()).await.unwrap();
    assert_eq!(ctx.ledger.summary().totals["EUR"], Decimal::from(7));
    assert!(ctx.access.needs_setup().await);
}

#[tokio::test]
async fn test_sequential_duckdb_opens() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("coffer.duckdb");
    for i in 0..5 {
        let store = DuckDbStore::open(&path).unwrap();
        store
            .save("counter", serde_json::json!(i))
            .await
            .unwrap();
    }
    let store = DuckDbStore::open(&path).unwrap();
    assert_eq!(store.get("counter").await.unwrap(), Some(serde_json::json!(4)));
}

#[tokio::test]
async fn test_open_store_per_backend() {
    let temp_dir = TempDir::new().unwrap();
    for backend in [StorageBackend::Duckdb, StorageBackend::Json] {
        let store = open_store(temp_dir.path(), backend).await.unwrap();
        store.save("banking_pin_hash", serde_json::json!("x")).await.unwrap();
        assert_eq!(
            store.get("banking_pin_hash").await.unwrap(),
            Some(serde_json::json!("x"))
        );
    }
    assert!(JsonFileStore::open(temp_dir.path().join("store"))
        .await
        .unwrap()
        .dir()
        .exists());
}
