// File I/O operations

pub mod csv;
pub mod sqlite;

pub use sqlite::SqliteStore;

/// Member database schema version (stored in `PRAGMA user_version`)
/// Increment when schema changes in a way that old versions can't read
pub const SCHEMA_VERSION: u32 = 1;
