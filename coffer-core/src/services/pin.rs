//! PIN guard - the single hashed PIN credential gating the app
//!
//! The credential lives in the same key-value store as the ledger, under its
//! own key. Storage failures are logged and swallowed here: a failed read
//! behaves like "no PIN", a failed write leaves the previous credential.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::domain::result::Result;
use crate::domain::{pin, PinHashScheme};
use crate::ports::KeyValueStore;

/// Store key holding the PIN hash
pub const PIN_KEY: &str = "banking_pin_hash";

pub struct PinGuard {
    store: Arc<dyn KeyValueStore>,
    scheme: PinHashScheme,
}

impl PinGuard {
    pub fn new(store: Arc<dyn KeyValueStore>, scheme: PinHashScheme) -> Self {
        Self { store, scheme }
    }

    async fn stored_hash(&self) -> Option<String> {
        match self.store.get(PIN_KEY).await {
            Ok(Some(JsonValue::String(hash))) if !hash.is_empty() => Some(hash),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read PIN credential");
                None
            }
        }
    }

    /// True when a non-empty credential is stored
    pub async fn has_pin(&self) -> bool {
        self.stored_hash().await.is_some()
    }

    /// Hash and store `pin`, replacing any previous credential
    ///
    /// Fails only on a malformed PIN; storage failures are logged.
    pub async fn set_pin(&self, pin: &str) -> Result<()> {
        PinHashScheme::check_format(pin)?;
        let hash = self.scheme.hash(pin)?;
        if let Err(e) = self.store.save(PIN_KEY, JsonValue::String(hash)).await {
            tracing::warn!(error = %e, "could not store PIN credential");
        }
        Ok(())
    }

    pub async fn validate_pin(&self, pin: &str) -> bool {
        if pin.is_empty() {
            return false;
        }
        match self.stored_hash().await {
            Some(stored) => pin::verify_pin(pin, &stored),
            None => false,
        }
    }

    /// Remove the credential; clearing twice is fine
    pub async fn clear_pin(&self) {
        if let Err(e) = self.store.remove(PIN_KEY).await {
            tracing::warn!(error = %e, "could not remove PIN credential");
        }
    }

    /// Scheme the stored credential uses, if any
    pub async fn stored_scheme(&self) -> Option<PinHashScheme> {
        self.stored_hash()
            .await
            .map(|hash| PinHashScheme::of_stored(&hash))
    }
}
