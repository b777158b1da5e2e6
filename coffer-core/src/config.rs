//! Configuration management
//!
//! Settings live in `settings.json` under the data directory:
//! ```json
//! {
//!   "interest": { "daySeconds": 86400, "minAccrualSeconds": 86400, "defaultSavingsRate": "2.5" },
//!   "persistence": { "mode": "background", "maxRetries": 3, "retryDelayMs": 50 },
//!   "pin": { "scheme": "legacy" },
//!   "storage": { "backend": "duckdb" }
//! }
//! ```
//! Unknown top-level fields are kept when the file is saved back.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::{InterestPolicy, PinHashScheme, DEFAULT_SAVINGS_RATE};
use crate::services::persistence::{
    PersistenceMode, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS,
};
use crate::services::LedgerSettings;

const SETTINGS_FILE: &str = "settings.json";
const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterestSettings {
    pub day_seconds: u64,
    pub min_accrual_seconds: u64,
    pub default_savings_rate: Decimal,
}

impl Default for InterestSettings {
    fn default() -> Self {
        Self {
            day_seconds: SECONDS_PER_DAY,
            min_accrual_seconds: SECONDS_PER_DAY,
            default_savings_rate: DEFAULT_SAVINGS_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistenceSettings {
    pub mode: PersistenceMode,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            mode: PersistenceMode::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinSettings {
    pub scheme: PinHashScheme,
}

/// Where ledger documents are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `coffer.duckdb` in the data directory
    #[default]
    Duckdb,
    /// One JSON file per key under `store/`
    Json,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "duckdb" => Ok(Self::Duckdb),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!("unknown storage backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
}

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    interest: InterestSettings,
    #[serde(default)]
    persistence: PersistenceSettings,
    #[serde(default)]
    pin: PinSettings,
    #[serde(default)]
    storage: StorageSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(error = %e, path = %path.display(), "malformed settings, using defaults");
        SettingsFile::default()
    }))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub interest: InterestSettings,
    pub persistence: PersistenceSettings,
    pub pin: PinSettings,
    pub storage: StorageSettings,
}

impl Config {
    /// Load config from the data directory, then apply `COFFER_*` overrides
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(&data_dir.join(SETTINGS_FILE))?;
        let mut config = Self {
            interest: raw.interest,
            persistence: raw.persistence,
            pin: raw.pin,
            storage: raw.storage,
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply environment-style overrides looked up through `var`
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn seconds(name: &str, value: &str) -> Result<u64> {
            value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{name} must be a whole number of seconds")))
        }

        if let Some(v) = var("COFFER_DAY_SECONDS") {
            self.interest.day_seconds = seconds("COFFER_DAY_SECONDS", &v)?;
        }
        if let Some(v) = var("COFFER_MIN_ACCRUAL_SECONDS") {
            self.interest.min_accrual_seconds = seconds("COFFER_MIN_ACCRUAL_SECONDS", &v)?;
        }
        if let Some(v) = var("COFFER_PERSISTENCE_MODE") {
            self.persistence.mode = match v.trim().to_lowercase().as_str() {
                "background" => PersistenceMode::Background,
                "synchronous" | "sync" => PersistenceMode::Synchronous,
                other => {
                    return Err(Error::Config(format!("unknown persistence mode: {other}")))
                }
            };
        }
        if let Some(v) = var("COFFER_STORAGE") {
            self.storage.backend = v.parse()?;
        }
        Ok(())
    }

    /// Save managed sections, preserving anything else in the file
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(SETTINGS_FILE);
        let mut settings = read_settings(&path)?;

        settings.interest = self.interest.clone();
        settings.persistence = self.persistence.clone();
        settings.pin = self.pin.clone();
        settings.storage = self.storage.clone();

        std::fs::create_dir_all(data_dir)?;
        std::fs::write(&path, serde_json::to_string_pretty(&settings)?)?;
        Ok(())
    }

    /// Ledger tunables derived from these settings
    pub fn ledger_settings(&self) -> Result<LedgerSettings> {
        if self.interest.day_seconds == 0 {
            return Err(Error::Config("interest.daySeconds must be positive".into()));
        }
        let secs = |s: u64| {
            i64::try_from(s)
                .ok()
                .and_then(Duration::try_seconds)
                .ok_or_else(|| Error::Config(format!("{s} seconds is out of range")))
        };
        Ok(LedgerSettings {
            interest: InterestPolicy::new(
                secs(self.interest.day_seconds)?,
                secs(self.interest.min_accrual_seconds)?,
            ),
            default_savings_rate: self.interest.default_savings_rate,
            persistence: self.persistence.mode,
            retry: RetryPolicy {
                max_retries: self.persistence.max_retries,
                initial_delay: StdDuration::from_millis(self.persistence.retry_delay_ms),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.apply_overrides(|_| None).unwrap();
        assert_eq!(config.interest.day_seconds, 86_400);
        assert_eq!(config.storage.backend, StorageBackend::Duckdb);

        let raw = read_settings(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(raw.persistence.max_retries, 3);
        assert_eq!(raw.pin.scheme, PinHashScheme::Legacy);
    }

    #[test]
    fn test_partial_file_and_preserved_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"{"interest": {"daySeconds": 1}, "pin": {"scheme": "argon2id"}, "theme": "dark"}"#,
        )
        .unwrap();

        let raw = read_settings(&path).unwrap();
        assert_eq!(raw.interest.day_seconds, 1);
        assert_eq!(raw.interest.min_accrual_seconds, 86_400);
        assert_eq!(raw.pin.scheme, PinHashScheme::Argon2id);

        let mut config = Config {
            interest: raw.interest,
            persistence: raw.persistence,
            pin: raw.pin,
            storage: raw.storage,
        };
        config.storage.backend = StorageBackend::Json;
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["theme"], "dark");
        assert_eq!(saved["storage"]["backend"], "json");
        assert_eq!(saved["interest"]["daySeconds"], 1);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        let raw = read_settings(&path).unwrap();
        assert_eq!(raw.interest, InterestSettings::default());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(|name| match name {
                "COFFER_DAY_SECONDS" => Some("1".into()),
                "COFFER_MIN_ACCRUAL_SECONDS" => Some("0".into()),
                "COFFER_PERSISTENCE_MODE" => Some("Synchronous".into()),
                "COFFER_STORAGE" => Some("json".into()),
                _ => None,
            })
            .unwrap();

        let settings = config.ledger_settings().unwrap();
        assert_eq!(settings.interest.day_length, Duration::seconds(1));
        assert_eq!(settings.interest.min_accrual_interval, Duration::zero());
        assert_eq!(settings.persistence, PersistenceMode::Synchronous);
        assert_eq!(config.storage.backend, StorageBackend::Json);
    }

    #[test]
    fn test_bad_overrides_are_config_errors() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|name| (name == "COFFER_DAY_SECONDS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = config
            .apply_overrides(|name| (name == "COFFER_STORAGE").then(|| "s3".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_day_length_rejected() {
        let mut config = Config::default();
        config.interest.day_seconds = 0;
        assert!(matches!(config.ledger_settings(), Err(Error::Config(_))));
    }
}
