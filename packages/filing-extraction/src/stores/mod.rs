//! Storage implementations for the extraction cache.
//!
//! Available backends:
//! - `MemoryStore` - In-memory storage (always available)
//! - `FileStore` - One JSON file per entry under a cache directory (always available)
//! - `SqliteStore` - SQLite file-based storage (requires `sqlite` feature)

pub mod file;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::FileStore;
pub use memory::MemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
