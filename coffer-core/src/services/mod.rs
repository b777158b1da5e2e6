//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod access;
mod ledger;
pub mod logging;
pub mod migration;
pub mod persistence;
mod pin;

pub use access::AccessGate;
pub use ledger::{Ledger, LedgerDocument, LedgerSettings, LedgerSummary, SortKey};
pub use logging::{LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use persistence::{PersistenceMode, PersistenceStats, RetryPolicy};
pub use pin::{PinGuard, PIN_KEY};
