use super::store::{KeyValueStore, StoreResult, resolve_range};
use crate::error::RegistryError;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Keyspace {
    hashes: HashMap<String, BTreeMap<String, String>>,
    // Insertion-ordered, membership checked on insert
    sets: HashMap<String, Vec<String>>,
    // Index 0 is the head
    lists: HashMap<String, Vec<String>>,
}

/// In-process key-value store, used for `:memory:` deployments and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Keyspace>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Keyspace>> {
        self.inner
            .lock()
            .map_err(|_| RegistryError::StorageFailure("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut space = self.lock()?;
        let set = space.sets.entry(key.to_string()).or_default();
        if set.iter().any(|m| m == member) {
            return Ok(false);
        }
        set.push(member.to_string());
        Ok(true)
    }

    fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut space = self.lock()?;
        let Some(set) = space.sets.get_mut(key) else {
            return Ok(false);
        };
        let before = set.len();
        set.retain(|m| m != member);
        let removed = set.len() != before;
        if set.is_empty() {
            space.sets.remove(key);
        }
        Ok(removed)
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.sets.get(key).cloned().unwrap_or_default())
    }

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .lock()?
            .sets
            .get(key)
            .is_some_and(|set| set.iter().any(|m| m == member)))
    }

    fn scard(&self, key: &str) -> StoreResult<usize> {
        Ok(self.lock()?.sets.get(key).map_or(0, Vec::len))
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        Ok(self
            .lock()?
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned()))
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.lock()?
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        let mut space = self.lock()?;
        let Some(hash) = space.hashes.get_mut(key) else {
            return Ok(false);
        };
        let removed = hash.remove(field).is_some();
        if hash.is_empty() {
            space.hashes.remove(key);
        }
        Ok(removed)
    }

    fn hset_all(&self, key: &str, fields: &BTreeMap<String, String>) -> StoreResult<()> {
        let mut space = self.lock()?;
        let hash = space.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    fn hgetall(&self, key: &str) -> StoreResult<BTreeMap<String, String>> {
        Ok(self.lock()?.hashes.get(key).cloned().unwrap_or_default())
    }

    fn lpush(&self, key: &str, value: &str) -> StoreResult<usize> {
        let mut space = self.lock()?;
        let list = space.lists.entry(key.to_string()).or_default();
        list.insert(0, value.to_string());
        Ok(list.len())
    }

    fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let space = self.lock()?;
        let Some(list) = space.lists.get(key) else {
            return Ok(Vec::new());
        };
        Ok(match resolve_range(list.len(), start, stop) {
            Some((from, to)) => list[from..=to].to_vec(),
            None => Vec::new(),
        })
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let space = self.lock()?;
        Ok(space.hashes.contains_key(key)
            || space.sets.contains_key(key)
            || space.lists.contains_key(key))
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        let mut space = self.lock()?;
        let hash = space.hashes.remove(key).is_some();
        let set = space.sets.remove(key).is_some();
        let list = space.lists.remove(key).is_some();
        Ok(hash || set || list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emptied_set_no_longer_exists() {
        let store = MemoryStore::new();
        store.sadd("user:alice:packages", "package:alice/flowmon").unwrap();
        assert!(store.exists("user:alice:packages").unwrap());

        store.srem("user:alice:packages", "package:alice/flowmon").unwrap();
        assert!(!store.exists("user:alice:packages").unwrap());
        assert_eq!(store.scard("user:alice:packages").unwrap(), 0);
    }

    #[test]
    fn test_hdel_removes_emptied_hash() {
        let store = MemoryStore::new();
        store.hset("artifacts:alice/flowmon", "1.0", "flowmon-20240517-1.napp").unwrap();

        assert!(store.hdel("artifacts:alice/flowmon", "1.0").unwrap());
        assert!(!store.hdel("artifacts:alice/flowmon", "1.0").unwrap());
        assert!(!store.exists("artifacts:alice/flowmon").unwrap());
    }

    #[test]
    fn test_lrange_head_and_tail() {
        let store = MemoryStore::new();
        for value in ["a", "b", "c"] {
            store.lpush("l", value).unwrap();
        }

        assert_eq!(store.lrange("l", 0, 0).unwrap(), vec!["c"]);
        assert_eq!(store.lrange("l", -1, -1).unwrap(), vec!["a"]);
        assert_eq!(store.lrange("l", 0, -1).unwrap(), vec!["c", "b", "a"]);
        assert!(store.lrange("missing", 0, -1).unwrap().is_empty());
    }
}
