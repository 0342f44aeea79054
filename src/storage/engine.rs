//! Storage engine trait

use crate::error::{Error, Result};

/// Read access inside a transaction.
///
/// Every read observes the snapshot taken when the transaction began.
pub trait ReadTxn {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Visit every entry whose key starts with `prefix`, in ascending byte order.
    fn scan_prefix(&self, prefix: &[u8], visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()>;
}

/// Read-write access inside a transaction.
pub trait WriteTxn: ReadTxn {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// Ordered key-value engine with atomic transactions.
///
/// If the closure passed to `write_txn` returns an error, the transaction is
/// aborted and none of its writes become visible.
pub trait StorageEngine: Send + Sync {
    fn read_txn(&self, f: &mut dyn FnMut(&dyn ReadTxn) -> Result<()>) -> Result<()>;

    fn write_txn(&self, f: &mut dyn FnMut(&mut dyn WriteTxn) -> Result<()>) -> Result<()>;
}

/// Main storage interface
pub struct Storage {
    engine: Box<dyn StorageEngine>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish()
    }
}

impl Storage {
    pub fn new(engine: Box<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    /// Run `f` inside a read-only snapshot transaction.
    pub fn read<T>(&self, f: impl FnOnce(&dyn ReadTxn) -> Result<T>) -> Result<T> {
        let mut body = Some(f);
        let mut output = None;
        self.engine.read_txn(&mut |txn| {
            let body = body
                .take()
                .ok_or_else(|| Error::Internal("read transaction body ran twice".to_string()))?;
            output = Some(body(txn)?);
            Ok(())
        })?;
        output.ok_or_else(|| Error::Internal("read transaction produced no result".to_string()))
    }

    /// Run `f` inside an atomic read-write transaction.
    pub fn write<T>(&self, f: impl FnOnce(&mut dyn WriteTxn) -> Result<T>) -> Result<T> {
        let mut body = Some(f);
        let mut output = None;
        self.engine.write_txn(&mut |txn| {
            let body = body
                .take()
                .ok_or_else(|| Error::Internal("write transaction body ran twice".to_string()))?;
            output = Some(body(txn)?);
            Ok(())
        })?;
        output.ok_or_else(|| Error::Internal("write transaction produced no result".to_string()))
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.read(|txn| txn.get(key))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(|txn| txn.put(key, value))
    }

    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.read(|txn| {
            let mut entries = Vec::new();
            txn.scan_prefix(prefix, &mut |key, value| {
                entries.push((key.to_vec(), value.to_vec()));
                Ok(())
            })?;
            Ok(entries)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockStorage;

    fn storage() -> Storage {
        Storage::new(Box::new(MockStorage::new()))
    }

    #[test]
    fn test_single_shot_ops() -> Result<()> {
        let storage = storage();

        storage.put(b"a/1", b"one")?;
        storage.put(b"a/2", b"two")?;
        storage.put(b"b/1", b"other")?;

        assert_eq!(storage.get(b"a/1")?, Some(b"one".to_vec()));
        assert_eq!(storage.get(b"a/3")?, None);

        let scanned = storage.scan_prefix(b"a/")?;
        assert_eq!(
            scanned,
            vec![
                (b"a/1".to_vec(), b"one".to_vec()),
                (b"a/2".to_vec(), b"two".to_vec()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_failed_write_commits_nothing() -> Result<()> {
        let storage = storage();

        let result: Result<()> = storage.write(|txn| {
            txn.put(b"k1", b"v1")?;
            txn.put(b"k2", b"v2")?;
            Err(Error::Internal("abort".to_string()))
        });
        assert!(result.is_err());

        assert_eq!(storage.get(b"k1")?, None);
        assert_eq!(storage.get(b"k2")?, None);
        Ok(())
    }

    #[test]
    fn test_write_sees_own_writes() -> Result<()> {
        let storage = storage();

        let seen = storage.write(|txn| {
            txn.put(b"k", b"v")?;
            txn.get(b"k")
        })?;
        assert_eq!(seen, Some(b"v".to_vec()));
        Ok(())
    }
}
