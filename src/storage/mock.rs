//! Mock storage for testing
//!
//! This module provides a simple in-memory ordered storage implementation
//! with the same transaction contract as the on-disk engine.

use crate::error::{Error, Result};
use crate::storage::engine::{ReadTxn, StorageEngine, WriteTxn};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory mock storage for testing
#[derive(Clone, Default)]
pub struct MockStorage {
    data: Arc<RwLock<Map>>,
    failing: Arc<AtomicBool>,
}

impl MockStorage {
    /// Create a new mock storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent transaction fail with a storage error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Get the number of entries stored
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected storage failure".to_string()));
        }
        Ok(())
    }
}

struct MapTxn<'a> {
    map: &'a Map,
}

struct StagedTxn {
    map: Map,
}

fn scan(map: &Map, prefix: &[u8], visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
    for (key, value) in map.range(prefix.to_vec()..) {
        if !key.starts_with(prefix) {
            break;
        }
        visit(key, value)?;
    }
    Ok(())
}

impl ReadTxn for MapTxn<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8], visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        scan(self.map, prefix, visit)
    }
}

impl ReadTxn for StagedTxn {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8], visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        scan(&self.map, prefix, visit)
    }
}

impl WriteTxn for StagedTxn {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

impl StorageEngine for MockStorage {
    fn read_txn(&self, f: &mut dyn FnMut(&dyn ReadTxn) -> Result<()>) -> Result<()> {
        self.check()?;
        let guard = self.data.read();
        f(&MapTxn { map: &*guard })
    }

    fn write_txn(&self, f: &mut dyn FnMut(&mut dyn WriteTxn) -> Result<()>) -> Result<()> {
        self.check()?;
        // Holding the write lock for the whole closure serializes writers.
        let mut guard = self.data.write();
        let mut txn = StagedTxn { map: guard.clone() };
        f(&mut txn)?;
        *guard = txn.map;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[test]
    fn test_mock_storage_basic_ops() -> Result<()> {
        let mock = MockStorage::new();
        let storage = Storage::new(Box::new(mock.clone()));

        storage.put(b"key1", b"value1")?;
        assert_eq!(storage.get(b"key1")?, Some(b"value1".to_vec()));

        storage.put(b"key1", b"value2")?;
        assert_eq!(storage.get(b"key1")?, Some(b"value2".to_vec()));
        assert_eq!(mock.len(), 1);

        Ok(())
    }

    #[test]
    fn test_mock_storage_scan_is_ordered() -> Result<()> {
        let storage = Storage::new(Box::new(MockStorage::new()));

        storage.put(b"p/c", b"3")?;
        storage.put(b"p/a", b"1")?;
        storage.put(b"p/b", b"2")?;
        storage.put(b"q/a", b"x")?;
        storage.put(b"p", b"marker")?;

        let keys: Vec<Vec<u8>> = storage
            .scan_prefix(b"p/")?
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"p/a".to_vec(), b"p/b".to_vec(), b"p/c".to_vec()]);
        Ok(())
    }

    #[test]
    fn test_mock_storage_failure_switch() {
        let mock = MockStorage::new();
        let storage = Storage::new(Box::new(mock.clone()));

        mock.set_failing(true);
        assert!(storage.get(b"key").unwrap_err().is_storage());
        assert!(storage.put(b"key", b"v").unwrap_err().is_storage());

        mock.set_failing(false);
        assert!(storage.get(b"key").unwrap().is_none());
        assert!(mock.is_empty());
    }
}
