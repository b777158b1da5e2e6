//! Access gate - authenticated/locked state on top of the PIN guard
//!
//! Observers subscribe to a watch channel and are woken only when the state
//! actually flips.

use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::result::Result;

use super::pin::PinGuard;

pub struct AccessGate {
    pins: Arc<PinGuard>,
    authenticated: watch::Sender<bool>,
}

impl AccessGate {
    pub fn new(pins: Arc<PinGuard>) -> Self {
        let (authenticated, _) = watch::channel(false);
        Self { pins, authenticated }
    }

    pub fn is_authenticated(&self) -> bool {
        *self.authenticated.borrow()
    }

    /// Receiver that sees every authenticated/locked transition
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    /// True when no PIN has been chosen yet
    pub async fn needs_setup(&self) -> bool {
        !self.pins.has_pin().await
    }

    /// Validate `pin` and unlock on success
    pub async fn unlock(&self, pin: &str) -> bool {
        let valid = self.pins.validate_pin(pin).await;
        if valid {
            self.set_authenticated(true);
        } else {
            tracing::debug!("PIN rejected");
        }
        valid
    }

    /// Choose the first PIN (or replace it) and unlock
    pub async fn set_up(&self, pin: &str) -> Result<()> {
        self.pins.set_pin(pin).await?;
        self.set_authenticated(true);
        Ok(())
    }

    pub fn lock(&self) {
        self.set_authenticated(false);
    }

    fn set_authenticated(&self, value: bool) {
        self.authenticated.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::PinHashScheme;

    fn gate() -> AccessGate {
        let store = Arc::new(MemoryStore::new());
        AccessGate::new(Arc::new(PinGuard::new(store, PinHashScheme::Legacy)))
    }

    #[tokio::test]
    async fn test_unlock_requires_valid_pin() {
        let gate = gate();
        assert!(gate.needs_setup().await);

        gate.set_up("4321").await.unwrap();
        gate.lock();
        assert!(!gate.is_authenticated());

        assert!(!gate.unlock("1111").await);
        assert!(!gate.is_authenticated());
        assert!(gate.unlock("4321").await);
        assert!(gate.is_authenticated());
    }

    #[tokio::test]
    async fn test_observers_see_only_changes() {
        let gate = gate();
        gate.set_up("1234").await.unwrap();

        let mut rx = gate.subscribe();
        assert!(*rx.borrow_and_update());

        // Unlocking an unlocked gate is not a change
        assert!(gate.unlock("1234").await);
        assert!(!rx.has_changed().unwrap());

        gate.lock();
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_bad_setup_pin_keeps_gate_locked() {
        let gate = gate();
        assert!(gate.set_up("12a4").await.is_err());
        assert!(!gate.is_authenticated());
        assert!(gate.needs_setup().await);
    }
}
