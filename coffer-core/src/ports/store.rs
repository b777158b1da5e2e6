//! Key-value store port - persistence abstraction
//!
//! The ledger and the PIN guard only ever talk to storage through this trait.
//! Values are JSON documents; the typed helpers below do the serde work.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::domain::result::Result;

/// Asynchronous key-value store
///
/// Every call may fail independently. Implementations must keep keys stable
/// across the process lifetime so documents round-trip.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    async fn save(&self, key: &str, value: JsonValue) -> Result<()>;

    /// Fetch the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<JsonValue>>;

    /// Delete `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Serialize `value` and save it under `key`
pub async fn save_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_value(value)?;
    store.save(key, json).await
}

/// Load and deserialize the value under `key`
pub async fn load_json<T>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(JsonValue::Null) | None => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}
