use super::memory::MemoryStore;
use super::store::{KeyValueStore, StoreResult};
use crate::error::RegistryError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// A `MemoryStore` whose single-field hash writes can be made to fail
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_hset: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_hset(&self, fail: bool) {
        self.fail_hset.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for FaultyStore {
    fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.sadd(key, member)
    }

    fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.srem(key, member)
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.inner.smembers(key)
    }

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.sismember(key, member)
    }

    fn scard(&self, key: &str) -> StoreResult<usize> {
        self.inner.scard(key)
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.inner.hget(key, field)
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        if self.fail_hset.load(Ordering::SeqCst) {
            return Err(RegistryError::StorageFailure(format!(
                "write to {key} refused"
            )));
        }
        self.inner.hset(key, field, value)
    }

    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        self.inner.hdel(key, field)
    }

    fn hset_all(&self, key: &str, fields: &BTreeMap<String, String>) -> StoreResult<()> {
        self.inner.hset_all(key, fields)
    }

    fn hgetall(&self, key: &str) -> StoreResult<BTreeMap<String, String>> {
        self.inner.hgetall(key)
    }

    fn lpush(&self, key: &str, value: &str) -> StoreResult<usize> {
        self.inner.lpush(key, value)
    }

    fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        self.inner.lrange(key, start, stop)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key)
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        self.inner.del(key)
    }
}
