//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod clock;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{load_json, save_json, KeyValueStore};
