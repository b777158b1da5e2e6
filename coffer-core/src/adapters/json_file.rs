//! JSON file store - one `<key>.json` file per key in a directory
//!
//! Writes go to a temporary file first and are renamed into place, so a
//! crash mid-write leaves the previous value intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::fs;

use crate::domain::result::{Error, Result};
use crate::ports::KeyValueStore;

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Use `dir` as the store root, creating it if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(Error::storage(format!("invalid key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn save(&self, key: &str, value: JsonValue) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(&value)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("data")).await.unwrap();

        store.save("banking_accounts", json!([{"id": 0}])).await.unwrap();
        assert!(dir.path().join("data/banking_accounts.json").exists());

        let reopened = JsonFileStore::open(dir.path().join("data")).await.unwrap();
        assert_eq!(
            reopened.get("banking_accounts").await.unwrap(),
            Some(json!([{"id": 0}]))
        );
    }

    #[tokio::test]
    async fn test_missing_key_and_idempotent_remove() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("nothing").await.unwrap(), None);
        store.remove("nothing").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        for key in ["../escape", "a/b", "", ".hidden"] {
            assert!(matches!(
                store.save(key, json!(1)).await,
                Err(Error::Storage(_))
            ));
        }
    }
}
