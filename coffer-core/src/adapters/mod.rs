//! Adapter implementations
//!
//! Adapters implement the `KeyValueStore` port with concrete technologies:
//! - DuckDB (`coffer.duckdb`), the default on-disk store
//! - one JSON file per key in a directory
//! - an in-memory map for tests and embedding

pub mod duckdb;
pub mod json_file;
pub mod memory;

pub use self::duckdb::DuckDbStore;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
