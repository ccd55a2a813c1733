//! The key-value contract every backing store must satisfy.
//!
//! Each primitive is atomic on its own key. Nothing here spans keys: callers
//! that touch several keys order their writes and clean up after themselves.

use crate::error::RegistryError;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

pub type StoreResult<T> = Result<T, RegistryError>;

pub type SharedStore = Arc<dyn KeyValueStore>;

pub trait KeyValueStore: Send + Sync + Debug {
    /// Adds `member` to the set at `key`. Returns `false` if it was already present.
    fn sadd(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Removes `member` from the set at `key`. Returns `false` if it was absent.
    fn srem(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Members of the set at `key` in insertion order.
    fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool>;

    fn scard(&self, key: &str) -> StoreResult<usize>;

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Removes one field. Returns `false` if it was absent.
    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool>;

    /// Writes every field in one step, leaving fields not named untouched.
    fn hset_all(&self, key: &str, fields: &BTreeMap<String, String>) -> StoreResult<()>;

    /// All fields of the hash at `key`; empty when the key does not exist.
    fn hgetall(&self, key: &str) -> StoreResult<BTreeMap<String, String>>;

    /// Pushes onto the head of the list at `key`, returning the new length.
    fn lpush(&self, key: &str, value: &str) -> StoreResult<usize>;

    /// Inclusive range from the head of the list, negative indices counting from the tail.
    fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>>;

    /// True if `key` holds a hash, set or list.
    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Removes `key` whatever it holds. Returns `false` if nothing was removed.
    fn del(&self, key: &str) -> StoreResult<bool>;
}

/// Resolves a Redis-style inclusive `[start, stop]` range against a list of `len` items.
pub(crate) fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }

    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len || stop < 0 {
        return None;
    }

    Some((start as usize, stop as usize))
}
