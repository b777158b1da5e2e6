//! PIN credential hashing
//!
//! Two schemes are supported:
//!
//! - `legacy`: base64(SHA-256(pin || "banking_salt")). The salt is a fixed
//!   constant, kept so credentials written by earlier installations still
//!   validate.
//! - `argon2id`: Argon2id with a random 16-byte salt per credential, stored as
//!   `argon2id$<salt b64>$<hash b64>`.
//!
//! Validation detects the scheme from the stored value, so switching the
//! configured scheme never locks out an existing PIN.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::result::{Error, Result};

/// Number of digits in a PIN
pub const PIN_LENGTH: usize = 4;

/// Fixed salt of the legacy scheme
const LEGACY_SALT: &str = "banking_salt";

const ARGON2_PREFIX: &str = "argon2id$";
const ARGON2_SALT_LEN: usize = 16;

/// Argon2id parameters, sized for a 4-digit secret checked interactively
const ARGON2_TIME_COST: u32 = 2;
const ARGON2_MEMORY_COST: u32 = 19456; // 19 MiB
const ARGON2_PARALLELISM: u32 = 1;
const ARGON2_HASH_LEN: usize = 32;

/// How new PIN credentials are hashed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinHashScheme {
    #[default]
    Legacy,
    Argon2id,
}

impl PinHashScheme {
    /// Check the PIN format: exactly four ASCII digits
    pub fn check_format(pin: &str) -> Result<()> {
        if pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) {
            Ok(())
        } else {
            Err(Error::InvalidPinFormat)
        }
    }

    /// Hash a PIN for storage
    pub fn hash(&self, pin: &str) -> Result<String> {
        match self {
            PinHashScheme::Legacy => Ok(legacy_hash(pin)),
            PinHashScheme::Argon2id => {
                let salt: [u8; ARGON2_SALT_LEN] = rand::thread_rng().gen();
                let hash = argon2_hash(pin, &salt)?;
                Ok(format!(
                    "{}{}${}",
                    ARGON2_PREFIX,
                    STANDARD.encode(salt),
                    STANDARD.encode(hash)
                ))
            }
        }
    }

    /// Scheme a stored credential was written with
    pub fn of_stored(stored: &str) -> Self {
        if stored.starts_with(ARGON2_PREFIX) {
            PinHashScheme::Argon2id
        } else {
            PinHashScheme::Legacy
        }
    }
}

/// Compare `pin` against a stored credential of either scheme
pub fn verify_pin(pin: &str, stored: &str) -> bool {
    match stored.strip_prefix(ARGON2_PREFIX) {
        Some(rest) => {
            let Some((salt_b64, hash_b64)) = rest.split_once('$') else {
                return false;
            };
            let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt_b64), STANDARD.decode(hash_b64))
            else {
                return false;
            };
            match argon2_hash(pin, &salt) {
                Ok(actual) => constant_time_eq(&actual, &expected),
                Err(_) => false,
            }
        }
        None => constant_time_eq(legacy_hash(pin).as_bytes(), stored.as_bytes()),
    }
}

fn legacy_hash(pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hasher.update(LEGACY_SALT.as_bytes());
    STANDARD.encode(hasher.finalize())
}

fn argon2_hash(pin: &str, salt: &[u8]) -> Result<Vec<u8>> {
    let params = Params::new(
        ARGON2_MEMORY_COST,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(ARGON2_HASH_LEN),
    )
    .map_err(|e| Error::invalid_operation(format!("argon2 params: {e}")))?;

    let mut out = vec![0u8; ARGON2_HASH_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(pin.as_bytes(), salt, &mut out)
        .map_err(|e| Error::invalid_operation(format!("argon2 hash: {e}")))?;
    Ok(out)
}

/// Equality whose running time depends only on the lengths
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_format() {
        assert!(PinHashScheme::check_format("1234").is_ok());
        assert!(PinHashScheme::check_format("0000").is_ok());
        for bad in ["12a4", "123", "12345", "", " 123", "١٢٣٤"] {
            assert!(
                matches!(PinHashScheme::check_format(bad), Err(Error::InvalidPinFormat)),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_legacy_hash_is_stable() {
        let hash = PinHashScheme::Legacy.hash("1234").unwrap();
        assert_eq!(hash, PinHashScheme::Legacy.hash("1234").unwrap());
        // base64 of a 32-byte digest
        assert_eq!(hash.len(), 44);
        assert!(verify_pin("1234", &hash));
        assert!(!verify_pin("4321", &hash));
    }

    #[test]
    fn test_legacy_hash_matches_existing_credentials() {
        // base64(SHA-256("1234banking_salt")) as earlier installations stored it
        assert_eq!(legacy_hash("1234"), "1RvScZX3jDodSCcAMfnneeeDi2lB0eRjKw785y3c/wQ=");
        assert!(verify_pin("1234", "1RvScZX3jDodSCcAMfnneeeDi2lB0eRjKw785y3c/wQ="));
    }

    #[test]
    fn test_argon2_hash_is_salted() {
        let first = PinHashScheme::Argon2id.hash("1234").unwrap();
        let second = PinHashScheme::Argon2id.hash("1234").unwrap();
        assert_ne!(first, second);
        assert_eq!(PinHashScheme::of_stored(&first), PinHashScheme::Argon2id);
        assert!(verify_pin("1234", &first));
        assert!(verify_pin("1234", &second));
        assert!(!verify_pin("0000", &first));
    }

    #[test]
    fn test_malformed_argon2_credential() {
        assert!(!verify_pin("1234", "argon2id$not-base64"));
        assert!(!verify_pin("1234", "argon2id$$"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
