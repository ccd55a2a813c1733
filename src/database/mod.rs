//! Key-value persistence for the registry
//!
//! - `store`: the `KeyValueStore` trait every backend implements
//! - `connection`: SQLite pool configuration, migrations and retry
//! - `hashes`, `sets`, `lists`, `keys`: SQLite operations per key type
//! - `service`: `DatabaseService`, the SQLite backend
//! - `memory`: `MemoryStore`, the in-process backend

pub mod connection;
#[cfg(test)]
pub(crate) mod faulty;
pub mod hashes;
pub mod keys;
pub mod lists;
pub mod memory;
pub mod service;
pub mod sets;
pub mod store;

pub use connection::{DbConnection, DbPool, MIGRATIONS};
pub use memory::MemoryStore;
pub use service::DatabaseService;
pub use store::{KeyValueStore, SharedStore, StoreResult};

pub use hashes::HashOperations;
pub use keys::KeyOperations;
pub use lists::ListOperations;
pub use sets::SetOperations;

use log::info;
use std::sync::Arc;

/// URL selecting the in-process backend
pub const MEMORY_URL: &str = ":memory:";

/// Opens the backend named by `database_url`
pub fn open_store(database_url: &str) -> Result<SharedStore, crate::error::RegistryError> {
    if database_url == MEMORY_URL {
        info!("Using in-memory key-value store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    Ok(Arc::new(DatabaseService::open(database_url)?))
}
