//! Persistence layer — key-value storage for wizard progress and records.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod progress;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use progress::ProgressStore;
pub use traits::KeyValueStore;
