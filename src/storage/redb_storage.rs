//! redb storage backend
//!
//! Provides a [`StorageEngine`] on top of redb: an ordered, copy-on-write
//! B-tree with MVCC snapshot reads and serializable single-writer write
//! transactions. All entries live in one byte-keyed table.

use crate::error::{Error, Result};
use crate::storage::engine::{ReadTxn, StorageEngine, WriteTxn};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadOnlyTable, ReadableTable, Table, TableDefinition};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

const ITEMS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("items");

/// redb-backed storage
pub struct RedbStorage {
    db: Database,
}

impl RedbStorage {
    /// Open (or create) a database file.
    ///
    /// # Example
    /// ```rust,ignore
    /// let storage = RedbStorage::open("data/kvbucket.redb")?;
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let db = Database::create(path).map_err(|e| {
            Error::Storage(format!("Failed to open database at {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), "Opened redb storage");
        Self::init(db)
    }

    /// Create a database that lives only in memory.
    pub fn in_memory() -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;

        debug!("Opened in-memory redb storage");
        Self::init(db)
    }

    /// Make sure the items table exists so read transactions can open it.
    fn init(db: Database) -> Result<Self> {
        let txn = db.begin_write().map_err(redb::Error::from)?;
        txn.open_table(ITEMS).map_err(redb::Error::from)?;
        txn.commit().map_err(redb::Error::from)?;
        Ok(Self { db })
    }
}

fn get_from<T>(table: &T, key: &[u8]) -> Result<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let value = table.get(key).map_err(redb::Error::from)?;
    Ok(value.map(|guard| guard.value().to_vec()))
}

fn scan_from<T>(
    table: &T,
    prefix: &[u8],
    visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>,
) -> Result<()>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    for entry in table.range::<&[u8]>(prefix..).map_err(redb::Error::from)? {
        let (key, value) = entry.map_err(redb::Error::from)?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        visit(key, value.value())?;
    }
    Ok(())
}

struct RedbReader {
    table: ReadOnlyTable<&'static [u8], &'static [u8]>,
}

impl ReadTxn for RedbReader {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        get_from(&self.table, key)
    }

    fn scan_prefix(&self, prefix: &[u8], visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        scan_from(&self.table, prefix, visit)
    }
}

struct RedbWriter<'txn> {
    table: Table<'txn, &'static [u8], &'static [u8]>,
}

impl ReadTxn for RedbWriter<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        get_from(&self.table, key)
    }

    fn scan_prefix(&self, prefix: &[u8], visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        scan_from(&self.table, prefix, visit)
    }
}

impl WriteTxn for RedbWriter<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.table.insert(key, value).map_err(redb::Error::from)?;
        Ok(())
    }
}

impl StorageEngine for RedbStorage {
    #[instrument(skip_all)]
    fn read_txn(&self, f: &mut dyn FnMut(&dyn ReadTxn) -> Result<()>) -> Result<()> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(ITEMS).map_err(redb::Error::from)?;
        f(&RedbReader { table })
    }

    #[instrument(skip_all)]
    fn write_txn(&self, f: &mut dyn FnMut(&mut dyn WriteTxn) -> Result<()>) -> Result<()> {
        let txn = self.db.begin_write().map_err(redb::Error::from)?;

        let outcome = {
            let table = txn.open_table(ITEMS).map_err(redb::Error::from)?;
            let mut writer = RedbWriter { table };
            f(&mut writer)
        };

        match outcome {
            Ok(()) => {
                txn.commit().map_err(redb::Error::from)?;
                debug!("Committed write transaction");
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    warn!(error = %abort_err, "Failed to abort write transaction");
                }
                Err(e)
            }
        }
    }
}
