//! Backing stores for record tables

pub mod memory_source;
pub mod sqlite_source;

pub use memory_source::MemoryRepository;
pub use sqlite_source::SqliteLeadStore;
