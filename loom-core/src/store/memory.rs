//! In-memory [`KvStore`] backend, used by default and in tests. Mirrors
//! the column-family shape of the RocksDB backend without a dependency
//! on RocksDB.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;

use super::KvStore;

#[derive(Default)]
pub struct InMemoryKvStore {
    data: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for InMemoryKvStore {
    fn put_raw(&self, cf: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        data.entry(cf.to_string()).or_default().insert(key.to_string(), value);
        Ok(())
    }

    fn get_raw(&self, cf: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(data.get(cf).and_then(|m| m.get(key)).cloned())
    }

    fn delete_raw(&self, cf: &str, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(m) = data.get_mut(cf) {
            m.remove(key);
        }
        Ok(())
    }

    fn list_raw(&self, cf: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(data.get(cf).map(|m| m.values().cloned().collect()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = InMemoryKvStore::new();
        store.put_raw("cf", "k", b"v".to_vec()).unwrap();
        assert_eq!(store.get_raw("cf", "k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn delete_removes_key() {
        let store = InMemoryKvStore::new();
        store.put_raw("cf", "k", b"v".to_vec()).unwrap();
        store.delete_raw("cf", "k").unwrap();
        assert_eq!(store.get_raw("cf", "k").unwrap(), None);
    }

    #[test]
    fn list_raw_returns_all_values_in_a_cf() {
        let store = InMemoryKvStore::new();
        store.put_raw("cf", "a", b"1".to_vec()).unwrap();
        store.put_raw("cf", "b", b"2".to_vec()).unwrap();
        store.put_raw("other", "c", b"3".to_vec()).unwrap();
        let mut values = store.list_raw("cf").unwrap();
        values.sort();
        assert_eq!(values, vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn get_raw_on_missing_cf_returns_none() {
        let store = InMemoryKvStore::new();
        assert_eq!(store.get_raw("nonexistent", "k").unwrap(), None);
    }
}
