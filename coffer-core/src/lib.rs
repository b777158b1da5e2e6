//! Coffer Core - personal banking ledger
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Account, Transaction, interest and PIN rules)
//! - **ports**: Trait definitions for external dependencies (KeyValueStore, Clock)
//! - **services**: Ledger, PIN guard, access gate, persistence queue, event log
//! - **adapters**: Concrete stores (DuckDB, JSON files, memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use adapters::{DuckDbStore, JsonFileStore};
use config::{Config, StorageBackend};
use ports::{Clock, KeyValueStore, SystemClock};
use services::{AccessGate, Ledger, PinGuard};

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult, Result};
pub use domain::{Account, AccountId, Transaction, TransactionKind};

/// Database file used by the DuckDB backend
pub const STORE_DB_FILE: &str = "coffer.duckdb";

/// Directory used by the JSON file backend
pub const STORE_JSON_DIR: &str = "store";

/// Main context for Coffer operations
///
/// Holds the configuration, the store and the services built on it. The
/// ledger has finished loading by the time a context is returned.
pub struct CofferContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub store: Arc<dyn KeyValueStore>,
    pub ledger: Ledger,
    pub pins: Arc<PinGuard>,
    pub access: AccessGate,
}

impl CofferContext {
    /// Open the data directory with the configured backend and system time
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let store = open_store(data_dir, config.storage.backend).await?;
        Self::with_store(config, data_dir, store, Arc::new(SystemClock)).await
    }

    /// Build a context over an existing store and clock
    pub async fn with_store(
        config: Config,
        data_dir: &Path,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let ledger = Ledger::load(Arc::clone(&store), clock, config.ledger_settings()?).await?;
        let pins = Arc::new(PinGuard::new(Arc::clone(&store), config.pin.scheme));
        let access = AccessGate::new(Arc::clone(&pins));

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            store,
            ledger,
            pins,
            access,
        })
    }
}

/// Open the store for `backend` under `data_dir`
pub async fn open_store(data_dir: &Path, backend: StorageBackend) -> Result<Arc<dyn KeyValueStore>> {
    match backend {
        StorageBackend::Duckdb => {
            let path = data_dir.join(STORE_DB_FILE);
            let store = tokio::task::spawn_blocking(move || DuckDbStore::open(&path))
                .await
                .map_err(|e| Error::storage(e.to_string()))??;
            Ok(Arc::new(store))
        }
        StorageBackend::Json => {
            let store = JsonFileStore::open(data_dir.join(STORE_JSON_DIR)).await?;
            Ok(Arc::new(store))
        }
    }
}
