use super::connection::{DbConnection, DbPool, create_pool, get_connection_with_retry};
use super::hashes::HashOperations;
use super::keys::KeyOperations;
use super::lists::ListOperations;
use super::sets::SetOperations;
use super::store::{KeyValueStore, StoreResult};
use crate::error::RegistryError;
use log::info;
use std::collections::BTreeMap;

/// SQLite-backed key-value store exposing the primitives through the operation structs
#[derive(Debug)]
pub struct DatabaseService {
    pub pool: DbPool,
    url: String,
}

impl DatabaseService {
    /// Opens the store at `database_url`, creating and migrating it if needed
    pub fn open(database_url: &str) -> Result<Self, RegistryError> {
        let pool = create_pool(database_url)?;
        Ok(Self {
            pool,
            url: database_url.to_string(),
        })
    }

    /// Releases the pool; outstanding connections close as they are returned
    pub fn close(self) {
        info!("Key-value store at {} closed", self.url);
        drop(self.pool);
    }

    pub fn get_connection(&self) -> Result<DbConnection, RegistryError> {
        get_connection_with_retry(&self.pool)
    }
}

impl KeyValueStore for DatabaseService {
    fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        SetOperations::new(&self.pool).add(key, member)
    }

    fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        SetOperations::new(&self.pool).remove(key, member)
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        SetOperations::new(&self.pool).members(key)
    }

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        SetOperations::new(&self.pool).contains(key, member)
    }

    fn scard(&self, key: &str) -> StoreResult<usize> {
        SetOperations::new(&self.pool).count(key)
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        HashOperations::new(&self.pool).get(key, field)
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        HashOperations::new(&self.pool).set(key, field, value)
    }

    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        HashOperations::new(&self.pool).delete(key, field)
    }

    fn hset_all(&self, key: &str, fields: &BTreeMap<String, String>) -> StoreResult<()> {
        HashOperations::new(&self.pool).set_all(key, fields)
    }

    fn hgetall(&self, key: &str) -> StoreResult<BTreeMap<String, String>> {
        HashOperations::new(&self.pool).get_all(key)
    }

    fn lpush(&self, key: &str, value: &str) -> StoreResult<usize> {
        ListOperations::new(&self.pool).push_front(key, value)
    }

    fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        ListOperations::new(&self.pool).range(key, start, stop)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        KeyOperations::new(&self.pool).exists(key)
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        KeyOperations::new(&self.pool).delete(key)
    }
}
