//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
pub mod interest;
pub mod pin;
pub mod result;
mod transaction;

pub use account::{Account, AccountId, DEFAULT_SAVINGS_RATE, SAVINGS_ACCOUNT_TYPE};
pub use interest::InterestPolicy;
pub use pin::{verify_pin, PinHashScheme, PIN_LENGTH};
pub use transaction::{Transaction, TransactionKind};
